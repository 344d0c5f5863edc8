use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{postgres::PgRow, types::Json, PgPool, Row};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use super::models::{AchievementProgress, PlayerSnapshot, TrackedAchievement};
use crate::shared::AppError;

#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// Stores the snapshot unless one exists for the same (player, day).
    /// Returns whether a row was written.
    async fn insert_snapshot(&self, snapshot: &PlayerSnapshot) -> Result<bool, AppError>;
    async fn get_snapshot(
        &self,
        player_tag: &str,
        day: NaiveDate,
    ) -> Result<Option<PlayerSnapshot>, AppError>;
    /// Most recent snapshot strictly before `day`
    async fn latest_before(
        &self,
        player_tag: &str,
        day: NaiveDate,
    ) -> Result<Option<PlayerSnapshot>, AppError>;
    async fn players_on(&self, day: NaiveDate) -> Result<Vec<String>, AppError>;
    async fn delete_before(&self, cutoff: NaiveDate) -> Result<u64, AppError>;
}

/// In-memory implementation for development and testing
#[derive(Debug, Default)]
pub struct InMemorySnapshotRepository {
    snapshots: RwLock<BTreeMap<(String, NaiveDate), PlayerSnapshot>>,
}

impl InMemorySnapshotRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot_count(&self) -> usize {
        self.snapshots.read().await.len()
    }
}

#[async_trait]
impl SnapshotRepository for InMemorySnapshotRepository {
    #[instrument(skip(self, snapshot), fields(player_tag = %snapshot.player_tag, day = %snapshot.snapshot_date))]
    async fn insert_snapshot(&self, snapshot: &PlayerSnapshot) -> Result<bool, AppError> {
        let mut snapshots = self.snapshots.write().await;
        let key = (snapshot.player_tag.clone(), snapshot.snapshot_date);

        if snapshots.contains_key(&key) {
            debug!("Snapshot already stored in memory");
            return Ok(false);
        }

        snapshots.insert(key, snapshot.clone());
        debug!("Snapshot stored in memory");
        Ok(true)
    }

    async fn get_snapshot(
        &self,
        player_tag: &str,
        day: NaiveDate,
    ) -> Result<Option<PlayerSnapshot>, AppError> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots.get(&(player_tag.to_string(), day)).cloned())
    }

    async fn latest_before(
        &self,
        player_tag: &str,
        day: NaiveDate,
    ) -> Result<Option<PlayerSnapshot>, AppError> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots
            .range((player_tag.to_string(), NaiveDate::MIN)..(player_tag.to_string(), day))
            .next_back()
            .map(|(_, snapshot)| snapshot.clone()))
    }

    async fn players_on(&self, day: NaiveDate) -> Result<Vec<String>, AppError> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots
            .keys()
            .filter(|(_, date)| *date == day)
            .map(|(tag, _)| tag.clone())
            .collect())
    }

    #[instrument(skip(self))]
    async fn delete_before(&self, cutoff: NaiveDate) -> Result<u64, AppError> {
        let mut snapshots = self.snapshots.write().await;
        let initial_count = snapshots.len();
        snapshots.retain(|(_, date), _| *date >= cutoff);

        let removed = (initial_count - snapshots.len()) as u64;
        debug!(removed = removed, "Old snapshots removed from memory");
        Ok(removed)
    }
}

/// PostgreSQL implementation backed by `player_snapshots`
pub struct PostgresSnapshotRepository {
    pool: PgPool,
}

impl PostgresSnapshotRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SNAPSHOT_COLUMNS: &str = "player_tag, snapshot_date, name, trophies, best_trophies, \
    exp_level, town_hall_level, town_hall_weapon_level, builder_hall_level, builder_trophies, \
    league, attack_wins, defense_wins, war_stars, donations, donations_received, clan_tag, \
    clan_name, role, achievements, fingerprint, fetched_at";

fn snapshot_from_row(row: &PgRow) -> PlayerSnapshot {
    let achievements: Json<BTreeMap<TrackedAchievement, AchievementProgress>> =
        row.get("achievements");
    PlayerSnapshot {
        player_tag: row.get("player_tag"),
        snapshot_date: row.get("snapshot_date"),
        name: row.get("name"),
        trophies: row.get("trophies"),
        best_trophies: row.get("best_trophies"),
        exp_level: row.get("exp_level"),
        town_hall_level: row.get("town_hall_level"),
        town_hall_weapon_level: row.get("town_hall_weapon_level"),
        builder_hall_level: row.get("builder_hall_level"),
        builder_trophies: row.get("builder_trophies"),
        league: row.get("league"),
        attack_wins: row.get("attack_wins"),
        defense_wins: row.get("defense_wins"),
        war_stars: row.get("war_stars"),
        donations: row.get("donations"),
        donations_received: row.get("donations_received"),
        clan_tag: row.get("clan_tag"),
        clan_name: row.get("clan_name"),
        role: row.get("role"),
        achievements: achievements.0,
        fingerprint: row.get("fingerprint"),
        fetched_at: row.get("fetched_at"),
    }
}

#[async_trait]
impl SnapshotRepository for PostgresSnapshotRepository {
    #[instrument(skip(self, snapshot), fields(player_tag = %snapshot.player_tag, day = %snapshot.snapshot_date))]
    async fn insert_snapshot(&self, snapshot: &PlayerSnapshot) -> Result<bool, AppError> {
        let query = format!(
            "INSERT INTO player_snapshots ({}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22) \
             ON CONFLICT (player_tag, snapshot_date) DO NOTHING",
            SNAPSHOT_COLUMNS
        );

        let result = sqlx::query(&query)
            .bind(&snapshot.player_tag)
            .bind(snapshot.snapshot_date)
            .bind(&snapshot.name)
            .bind(snapshot.trophies)
            .bind(snapshot.best_trophies)
            .bind(snapshot.exp_level)
            .bind(snapshot.town_hall_level)
            .bind(snapshot.town_hall_weapon_level)
            .bind(snapshot.builder_hall_level)
            .bind(snapshot.builder_trophies)
            .bind(&snapshot.league)
            .bind(snapshot.attack_wins)
            .bind(snapshot.defense_wins)
            .bind(snapshot.war_stars)
            .bind(snapshot.donations)
            .bind(snapshot.donations_received)
            .bind(&snapshot.clan_tag)
            .bind(&snapshot.clan_name)
            .bind(&snapshot.role)
            .bind(Json(&snapshot.achievements))
            .bind(&snapshot.fingerprint)
            .bind(snapshot.fetched_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to store snapshot");
                AppError::DatabaseError(e.to_string())
            })?;

        let stored = result.rows_affected() == 1;
        debug!(stored = stored, "Snapshot insert finished");
        Ok(stored)
    }

    #[instrument(skip(self))]
    async fn get_snapshot(
        &self,
        player_tag: &str,
        day: NaiveDate,
    ) -> Result<Option<PlayerSnapshot>, AppError> {
        let query = format!(
            "SELECT {} FROM player_snapshots WHERE player_tag = $1 AND snapshot_date = $2",
            SNAPSHOT_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(player_tag)
            .bind(day)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to fetch snapshot");
                AppError::DatabaseError(e.to_string())
            })?;

        Ok(row.as_ref().map(snapshot_from_row))
    }

    #[instrument(skip(self))]
    async fn latest_before(
        &self,
        player_tag: &str,
        day: NaiveDate,
    ) -> Result<Option<PlayerSnapshot>, AppError> {
        let query = format!(
            "SELECT {} FROM player_snapshots WHERE player_tag = $1 AND snapshot_date < $2 \
             ORDER BY snapshot_date DESC LIMIT 1",
            SNAPSHOT_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(player_tag)
            .bind(day)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to fetch previous snapshot");
                AppError::DatabaseError(e.to_string())
            })?;

        Ok(row.as_ref().map(snapshot_from_row))
    }

    #[instrument(skip(self))]
    async fn players_on(&self, day: NaiveDate) -> Result<Vec<String>, AppError> {
        let rows = sqlx::query(
            "SELECT player_tag FROM player_snapshots WHERE snapshot_date = $1 ORDER BY player_tag",
        )
        .bind(day)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row.get("player_tag")).collect())
    }

    #[instrument(skip(self))]
    async fn delete_before(&self, cutoff: NaiveDate) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM player_snapshots WHERE snapshot_date < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to delete old snapshots");
                AppError::DatabaseError(e.to_string())
            })?;

        let removed = result.rows_affected();
        debug!(removed = removed, "Old snapshots deleted");
        Ok(removed)
    }
}
