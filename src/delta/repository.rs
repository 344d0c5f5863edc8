use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{postgres::PgRow, PgPool, Row};
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use super::models::DailyDelta;
use crate::shared::{from_db, to_db, AppError};

#[async_trait]
pub trait DeltaRepository: Send + Sync {
    /// Stores the delta unless one exists for (player, day); returns whether it was written
    async fn insert_delta(&self, delta: &DailyDelta) -> Result<bool, AppError>;
    async fn get_delta(&self, player_tag: &str, day: NaiveDate)
        -> Result<Option<DailyDelta>, AppError>;
    /// Deltas dated in `[start, end)`, oldest first
    async fn deltas_between(
        &self,
        player_tag: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyDelta>, AppError>;
    /// Players with at least one delta in `[start, end)`
    async fn players_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<String>, AppError>;
}

#[derive(Debug, Default)]
pub struct InMemoryDeltaRepository {
    deltas: RwLock<BTreeMap<(String, NaiveDate), DailyDelta>>,
}

impl InMemoryDeltaRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn delta_count(&self) -> usize {
        self.deltas.read().await.len()
    }
}

#[async_trait]
impl DeltaRepository for InMemoryDeltaRepository {
    async fn insert_delta(&self, delta: &DailyDelta) -> Result<bool, AppError> {
        let mut deltas = self.deltas.write().await;
        let key = (delta.player_tag.clone(), delta.delta_date);

        if deltas.contains_key(&key) {
            return Ok(false);
        }
        deltas.insert(key, delta.clone());
        Ok(true)
    }

    async fn get_delta(
        &self,
        player_tag: &str,
        day: NaiveDate,
    ) -> Result<Option<DailyDelta>, AppError> {
        let deltas = self.deltas.read().await;
        Ok(deltas.get(&(player_tag.to_string(), day)).cloned())
    }

    async fn deltas_between(
        &self,
        player_tag: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyDelta>, AppError> {
        if start >= end {
            return Ok(Vec::new());
        }
        let deltas = self.deltas.read().await;
        Ok(deltas
            .range((player_tag.to_string(), start)..(player_tag.to_string(), end))
            .map(|(_, delta)| delta.clone())
            .collect())
    }

    async fn players_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<String>, AppError> {
        let deltas = self.deltas.read().await;
        let players: BTreeSet<String> = deltas
            .keys()
            .filter(|(_, day)| *day >= start && *day < end)
            .map(|(tag, _)| tag.clone())
            .collect();
        Ok(players.into_iter().collect())
    }
}

pub struct PostgresDeltaRepository {
    pool: PgPool,
}

impl PostgresDeltaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const DELTA_COLUMNS: &str = "player_tag, delta_date, trophy_delta, exp_gained, attack_wins, \
    defense_wins, war_stars, donations_made, donations_received, gold_farmed, elixir_farmed, \
    dark_elixir_farmed, capital_gold_farmed, buildings_destroyed, obstacles_removed, \
    clan_changed, new_clan_tag, role_changed";

fn delta_from_row(row: &PgRow) -> DailyDelta {
    DailyDelta {
        player_tag: row.get("player_tag"),
        delta_date: row.get("delta_date"),
        trophy_delta: row.get("trophy_delta"),
        exp_gained: from_db(row.get("exp_gained")),
        attack_wins: from_db(row.get("attack_wins")),
        defense_wins: from_db(row.get("defense_wins")),
        war_stars: from_db(row.get("war_stars")),
        donations_made: from_db(row.get("donations_made")),
        donations_received: from_db(row.get("donations_received")),
        gold_farmed: from_db(row.get("gold_farmed")),
        elixir_farmed: from_db(row.get("elixir_farmed")),
        dark_elixir_farmed: from_db(row.get("dark_elixir_farmed")),
        capital_gold_farmed: from_db(row.get("capital_gold_farmed")),
        buildings_destroyed: from_db(row.get("buildings_destroyed")),
        obstacles_removed: from_db(row.get("obstacles_removed")),
        clan_changed: row.get("clan_changed"),
        new_clan_tag: row.get("new_clan_tag"),
        role_changed: row.get("role_changed"),
    }
}

#[async_trait]
impl DeltaRepository for PostgresDeltaRepository {
    #[instrument(skip(self, delta), fields(player_tag = %delta.player_tag, day = %delta.delta_date))]
    async fn insert_delta(&self, delta: &DailyDelta) -> Result<bool, AppError> {
        let query = format!(
            "INSERT INTO daily_deltas ({}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18) \
             ON CONFLICT (player_tag, delta_date) DO NOTHING",
            DELTA_COLUMNS
        );

        let result = sqlx::query(&query)
            .bind(&delta.player_tag)
            .bind(delta.delta_date)
            .bind(delta.trophy_delta)
            .bind(to_db(delta.exp_gained))
            .bind(to_db(delta.attack_wins))
            .bind(to_db(delta.defense_wins))
            .bind(to_db(delta.war_stars))
            .bind(to_db(delta.donations_made))
            .bind(to_db(delta.donations_received))
            .bind(to_db(delta.gold_farmed))
            .bind(to_db(delta.elixir_farmed))
            .bind(to_db(delta.dark_elixir_farmed))
            .bind(to_db(delta.capital_gold_farmed))
            .bind(to_db(delta.buildings_destroyed))
            .bind(to_db(delta.obstacles_removed))
            .bind(delta.clan_changed)
            .bind(&delta.new_clan_tag)
            .bind(delta.role_changed)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to store daily delta");
                AppError::DatabaseError(e.to_string())
            })?;

        let stored = result.rows_affected() == 1;
        debug!(stored = stored, "Delta insert finished");
        Ok(stored)
    }

    #[instrument(skip(self))]
    async fn get_delta(
        &self,
        player_tag: &str,
        day: NaiveDate,
    ) -> Result<Option<DailyDelta>, AppError> {
        let query = format!(
            "SELECT {} FROM daily_deltas WHERE player_tag = $1 AND delta_date = $2",
            DELTA_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(player_tag)
            .bind(day)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(delta_from_row))
    }

    #[instrument(skip(self))]
    async fn deltas_between(
        &self,
        player_tag: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyDelta>, AppError> {
        let query = format!(
            "SELECT {} FROM daily_deltas WHERE player_tag = $1 \
             AND delta_date >= $2 AND delta_date < $3 ORDER BY delta_date",
            DELTA_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(player_tag)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(delta_from_row).collect())
    }

    #[instrument(skip(self))]
    async fn players_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<String>, AppError> {
        let rows = sqlx::query(
            "SELECT DISTINCT player_tag FROM daily_deltas \
             WHERE delta_date >= $1 AND delta_date < $2 ORDER BY player_tag",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row.get("player_tag")).collect())
    }
}
