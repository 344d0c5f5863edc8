use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use super::models::{AwardedAchievement, SubjectScore};
use crate::shared::{from_db, to_db, AppError};

#[async_trait]
pub trait AchievementRepository: Send + Sync {
    /// Inserts the award under the (subject, achievement) uniqueness rule.
    /// Returns false when the pair was already awarded.
    async fn try_award(&self, award: &AwardedAchievement) -> Result<bool, AppError>;
    async fn awarded_keys(&self, subject_id: &str) -> Result<HashSet<String>, AppError>;
    /// Awards of the subject, oldest first
    async fn list_awards(&self, subject_id: &str) -> Result<Vec<AwardedAchievement>, AppError>;
    /// Subjects ranked by the summed `points` of their awards, then by award
    /// count, then by id. Keys missing from `points` are worth nothing.
    async fn top_subjects(
        &self,
        points: &HashMap<String, u32>,
        limit: usize,
    ) -> Result<Vec<SubjectScore>, AppError>;
}

#[derive(Debug, Default)]
pub struct InMemoryAchievementRepository {
    awards: RwLock<HashMap<(String, String), AwardedAchievement>>,
}

impl InMemoryAchievementRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn award_count(&self) -> usize {
        self.awards.read().await.len()
    }
}

#[async_trait]
impl AchievementRepository for InMemoryAchievementRepository {
    async fn try_award(&self, award: &AwardedAchievement) -> Result<bool, AppError> {
        let mut awards = self.awards.write().await;
        let key = (award.subject_id.clone(), award.achievement_key.clone());

        if awards.contains_key(&key) {
            return Ok(false);
        }
        awards.insert(key, award.clone());
        Ok(true)
    }

    async fn awarded_keys(&self, subject_id: &str) -> Result<HashSet<String>, AppError> {
        let awards = self.awards.read().await;
        Ok(awards
            .keys()
            .filter(|(subject, _)| subject == subject_id)
            .map(|(_, key)| key.clone())
            .collect())
    }

    async fn list_awards(&self, subject_id: &str) -> Result<Vec<AwardedAchievement>, AppError> {
        let awards = self.awards.read().await;
        let mut list: Vec<AwardedAchievement> = awards
            .values()
            .filter(|a| a.subject_id == subject_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| {
            a.awarded_at
                .cmp(&b.awarded_at)
                .then_with(|| a.achievement_key.cmp(&b.achievement_key))
        });
        Ok(list)
    }

    async fn top_subjects(
        &self,
        points: &HashMap<String, u32>,
        limit: usize,
    ) -> Result<Vec<SubjectScore>, AppError> {
        let awards = self.awards.read().await;
        let mut scores: HashMap<&str, SubjectScore> = HashMap::new();

        for (subject_id, key) in awards.keys() {
            let score = scores.entry(subject_id.as_str()).or_insert_with(|| SubjectScore {
                subject_id: subject_id.clone(),
                total_points: 0,
                unlocked: 0,
            });
            score.total_points += points.get(key).copied().map(u64::from).unwrap_or(0);
            score.unlocked += 1;
        }

        let mut ranked: Vec<SubjectScore> = scores.into_values().collect();
        ranked.sort_by(|a, b| {
            b.total_points
                .cmp(&a.total_points)
                .then_with(|| b.unlocked.cmp(&a.unlocked))
                .then_with(|| a.subject_id.cmp(&b.subject_id))
        });
        ranked.truncate(limit);
        Ok(ranked)
    }
}

pub struct PostgresAchievementRepository {
    pool: PgPool,
}

impl PostgresAchievementRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AchievementRepository for PostgresAchievementRepository {
    #[instrument(skip(self, award), fields(subject_id = %award.subject_id, achievement = %award.achievement_key))]
    async fn try_award(&self, award: &AwardedAchievement) -> Result<bool, AppError> {
        let result = sqlx::query(
            "INSERT INTO awarded_achievements (subject_id, achievement_key, counter_value, awarded_at) \
             VALUES ($1, $2, $3, $4) ON CONFLICT (subject_id, achievement_key) DO NOTHING",
        )
        .bind(&award.subject_id)
        .bind(&award.achievement_key)
        .bind(to_db(award.counter_value))
        .bind(award.awarded_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to store award");
            AppError::DatabaseError(e.to_string())
        })?;

        let inserted = result.rows_affected() == 1;
        debug!(inserted = inserted, "Award insert finished");
        Ok(inserted)
    }

    #[instrument(skip(self))]
    async fn awarded_keys(&self, subject_id: &str) -> Result<HashSet<String>, AppError> {
        let rows = sqlx::query(
            "SELECT achievement_key FROM awarded_achievements WHERE subject_id = $1",
        )
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row.get("achievement_key")).collect())
    }

    #[instrument(skip(self))]
    async fn list_awards(&self, subject_id: &str) -> Result<Vec<AwardedAchievement>, AppError> {
        let rows = sqlx::query(
            "SELECT subject_id, achievement_key, counter_value, awarded_at \
             FROM awarded_achievements WHERE subject_id = $1 \
             ORDER BY awarded_at, achievement_key",
        )
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| AwardedAchievement {
                subject_id: row.get("subject_id"),
                achievement_key: row.get("achievement_key"),
                counter_value: from_db(row.get("counter_value")),
                awarded_at: row.get("awarded_at"),
            })
            .collect())
    }

    #[instrument(skip(self, points))]
    async fn top_subjects(
        &self,
        points: &HashMap<String, u32>,
        limit: usize,
    ) -> Result<Vec<SubjectScore>, AppError> {
        let (keys, values): (Vec<String>, Vec<i64>) = points
            .iter()
            .map(|(key, points)| (key.clone(), i64::from(*points)))
            .unzip();

        let rows = sqlx::query(
            "SELECT a.subject_id, \
                    COALESCE(SUM(p.points), 0)::BIGINT AS total_points, \
                    COUNT(*) AS unlocked \
             FROM awarded_achievements a \
             LEFT JOIN UNNEST($1::TEXT[], $2::BIGINT[]) AS p(achievement_key, points) \
               ON p.achievement_key = a.achievement_key \
             GROUP BY a.subject_id \
             ORDER BY total_points DESC, unlocked DESC, a.subject_id \
             LIMIT $3",
        )
        .bind(&keys)
        .bind(&values)
        .bind(to_db(limit as u64))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| SubjectScore {
                subject_id: row.get("subject_id"),
                total_points: from_db(row.get("total_points")),
                unlocked: usize::try_from(row.get::<i64, _>("unlocked")).unwrap_or(0),
            })
            .collect())
    }
}
