use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::{
    catalog::AchievementCatalog,
    models::{
        level_for_points, AwardedAchievement, LeaderboardEntry, ProgressEntry, SubjectProfile,
    },
    repository::AchievementRepository,
};
use crate::activity::{ActivityCounters, ActivityRepository};
use crate::notification::{NoOpNotificationSink, NotificationEvent, NotificationSink};
use crate::shared::AppError;

/// Awards catalog achievements whose thresholds a subject's counters meet.
///
/// Safe to run concurrently for the same subject: the award store decides
/// the winner and the loser neither fails nor notifies.
pub struct AchievementEvaluator {
    catalog: Arc<AchievementCatalog>,
    activity: Arc<dyn ActivityRepository>,
    awards: Arc<dyn AchievementRepository>,
    sink: Arc<dyn NotificationSink>,
}

impl AchievementEvaluator {
    pub fn builder(
        activity: Arc<dyn ActivityRepository>,
        awards: Arc<dyn AchievementRepository>,
    ) -> AchievementEvaluatorBuilder {
        AchievementEvaluatorBuilder::new(activity, awards)
    }

    pub fn catalog(&self) -> &AchievementCatalog {
        &self.catalog
    }

    /// Newly awarded achievements of this call
    #[instrument(skip(self))]
    pub async fn evaluate(&self, subject_id: &str) -> Result<Vec<AwardedAchievement>, AppError> {
        let counters = self.counters(subject_id).await?;
        let already = self.awards.awarded_keys(subject_id).await?;
        let mut newly_awarded = Vec::new();

        for definition in self.catalog.active() {
            if already.contains(&definition.key) || !definition.is_met(&counters) {
                continue;
            }

            let award = AwardedAchievement {
                subject_id: subject_id.to_string(),
                achievement_key: definition.key.clone(),
                counter_value: counters.value(definition.counter),
                awarded_at: Utc::now(),
            };

            if !self.awards.try_award(&award).await? {
                debug!(achievement = %definition.key, "Already awarded by a concurrent evaluation");
                continue;
            }

            info!(
                achievement = %definition.key,
                counter = %definition.counter,
                value = award.counter_value,
                "Achievement unlocked"
            );

            let event = NotificationEvent::AchievementUnlocked {
                subject_id: subject_id.to_string(),
                achievement_key: definition.key.clone(),
                achievement_name: definition.name.clone(),
                reward_points: definition.reward_points,
                awarded_at: award.awarded_at,
            };
            if let Err(e) = self.sink.notify(event).await {
                warn!(achievement = %definition.key, error = %e, "Unlock notification failed");
            }

            newly_awarded.push(award);
        }

        Ok(newly_awarded)
    }

    pub async fn progress(&self, subject_id: &str) -> Result<Vec<ProgressEntry>, AppError> {
        let counters = self.counters(subject_id).await?;
        let awarded = self.awards.awarded_keys(subject_id).await?;

        Ok(self
            .catalog
            .active()
            .map(|definition| {
                ProgressEntry::new(
                    definition,
                    counters.value(definition.counter),
                    awarded.contains(&definition.key),
                )
            })
            .collect())
    }

    pub async fn profile(&self, subject_id: &str) -> Result<SubjectProfile, AppError> {
        let awarded = self.awards.list_awards(subject_id).await?;

        // awards of since-removed definitions earn no points
        let total_points: u64 = awarded
            .iter()
            .filter_map(|a| self.catalog.get(&a.achievement_key))
            .map(|d| u64::from(d.reward_points))
            .sum();

        Ok(SubjectProfile {
            subject_id: subject_id.to_string(),
            total_points,
            level: level_for_points(total_points),
            unlocked: awarded.len(),
            available: self.catalog.active().count(),
        })
    }

    /// Top `limit` subjects by total points; retired definitions still count
    /// for subjects that earned them, removed ones do not.
    #[instrument(skip(self))]
    pub async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, AppError> {
        let points: HashMap<String, u32> = self
            .catalog
            .all()
            .iter()
            .map(|d| (d.key.clone(), d.reward_points))
            .collect();

        let scores = self.awards.top_subjects(&points, limit).await?;
        Ok(scores
            .into_iter()
            .enumerate()
            .map(|(i, score)| LeaderboardEntry {
                rank: i + 1,
                level: level_for_points(score.total_points),
                subject_id: score.subject_id,
                total_points: score.total_points,
                unlocked: score.unlocked,
            })
            .collect())
    }

    pub async fn awards(&self, subject_id: &str) -> Result<Vec<AwardedAchievement>, AppError> {
        self.awards.list_awards(subject_id).await
    }

    async fn counters(&self, subject_id: &str) -> Result<ActivityCounters, AppError> {
        Ok(self
            .activity
            .get_counters(subject_id)
            .await?
            .unwrap_or_else(|| ActivityCounters::new(subject_id)))
    }
}

pub struct AchievementEvaluatorBuilder {
    catalog: AchievementCatalog,
    activity: Arc<dyn ActivityRepository>,
    awards: Arc<dyn AchievementRepository>,
    sink: Arc<dyn NotificationSink>,
}

impl AchievementEvaluatorBuilder {
    fn new(activity: Arc<dyn ActivityRepository>, awards: Arc<dyn AchievementRepository>) -> Self {
        Self {
            catalog: AchievementCatalog::standard(),
            activity,
            awards,
            sink: Arc::new(NoOpNotificationSink),
        }
    }

    pub fn with_catalog(mut self, catalog: AchievementCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn build(self) -> AchievementEvaluator {
        AchievementEvaluator {
            catalog: Arc::new(self.catalog),
            activity: self.activity,
            awards: self.awards,
            sink: self.sink,
        }
    }
}
