use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{postgres::PgRow, PgPool, Row};
use std::collections::HashMap;
use std::str::FromStr;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use super::models::{PeriodSummary, PeriodType};
use crate::shared::{from_db, to_db, AppError};

#[async_trait]
pub trait PeriodSummaryRepository: Send + Sync {
    /// Writes the whole summary, replacing an earlier one for the same key
    async fn upsert_summary(&self, summary: &PeriodSummary) -> Result<(), AppError>;
    async fn get_summary(
        &self,
        player_tag: &str,
        period_type: PeriodType,
        period_start: NaiveDate,
    ) -> Result<Option<PeriodSummary>, AppError>;
}

type SummaryKey = (String, PeriodType, NaiveDate);

#[derive(Debug, Default)]
pub struct InMemoryPeriodSummaryRepository {
    summaries: RwLock<HashMap<SummaryKey, PeriodSummary>>,
}

impl InMemoryPeriodSummaryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn summary_count(&self) -> usize {
        self.summaries.read().await.len()
    }
}

#[async_trait]
impl PeriodSummaryRepository for InMemoryPeriodSummaryRepository {
    async fn upsert_summary(&self, summary: &PeriodSummary) -> Result<(), AppError> {
        let mut summaries = self.summaries.write().await;
        summaries.insert(
            (
                summary.player_tag.clone(),
                summary.period_type,
                summary.period_start,
            ),
            summary.clone(),
        );
        Ok(())
    }

    async fn get_summary(
        &self,
        player_tag: &str,
        period_type: PeriodType,
        period_start: NaiveDate,
    ) -> Result<Option<PeriodSummary>, AppError> {
        let summaries = self.summaries.read().await;
        Ok(summaries
            .get(&(player_tag.to_string(), period_type, period_start))
            .cloned())
    }
}

pub struct PostgresPeriodSummaryRepository {
    pool: PgPool,
}

impl PostgresPeriodSummaryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SUMMARY_COLUMNS: &str = "player_tag, period_type, period_start, period_end, \
    days_recorded, active_days, trophy_delta, exp_gained, attack_wins, defense_wins, war_stars, \
    donations_made, donations_received, gold_farmed, elixir_farmed, dark_elixir_farmed, \
    capital_gold_farmed, buildings_destroyed, obstacles_removed, clan_changes, role_changes, \
    avg_trophy_delta, avg_donations_made, avg_donations_received, consistency_score";

fn summary_from_row(row: &PgRow) -> Result<PeriodSummary, AppError> {
    let period_type: String = row.get("period_type");
    let period_type = PeriodType::from_str(&period_type).map_err(|_| {
        AppError::DatabaseError(format!("unknown period type {}", period_type))
    })?;

    Ok(PeriodSummary {
        player_tag: row.get("player_tag"),
        period_type,
        period_start: row.get("period_start"),
        period_end: row.get("period_end"),
        days_recorded: u32::try_from(row.get::<i32, _>("days_recorded")).unwrap_or(0),
        active_days: u32::try_from(row.get::<i32, _>("active_days")).unwrap_or(0),
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
        clan_changes: u32::try_from(row.get::<i32, _>("clan_changes")).unwrap_or(0),
        role_changes: u32::try_from(row.get::<i32, _>("role_changes")).unwrap_or(0),
        avg_trophy_delta: row.get("avg_trophy_delta"),
        avg_donations_made: row.get("avg_donations_made"),
        avg_donations_received: row.get("avg_donations_received"),
        consistency_score: row.get("consistency_score"),
    })
}

#[async_trait]
impl PeriodSummaryRepository for PostgresPeriodSummaryRepository {
    #[instrument(skip(self, summary), fields(player_tag = %summary.player_tag, period = %summary.period_type, start = %summary.period_start))]
    async fn upsert_summary(&self, summary: &PeriodSummary) -> Result<(), AppError> {
        let query = format!(
            "INSERT INTO period_summaries ({}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25) \
             ON CONFLICT (player_tag, period_type, period_start) DO UPDATE SET \
             period_end = EXCLUDED.period_end, days_recorded = EXCLUDED.days_recorded, \
             active_days = EXCLUDED.active_days, trophy_delta = EXCLUDED.trophy_delta, \
             exp_gained = EXCLUDED.exp_gained, attack_wins = EXCLUDED.attack_wins, \
             defense_wins = EXCLUDED.defense_wins, war_stars = EXCLUDED.war_stars, \
             donations_made = EXCLUDED.donations_made, \
             donations_received = EXCLUDED.donations_received, \
             gold_farmed = EXCLUDED.gold_farmed, elixir_farmed = EXCLUDED.elixir_farmed, \
             dark_elixir_farmed = EXCLUDED.dark_elixir_farmed, \
             capital_gold_farmed = EXCLUDED.capital_gold_farmed, \
             buildings_destroyed = EXCLUDED.buildings_destroyed, \
             obstacles_removed = EXCLUDED.obstacles_removed, \
             clan_changes = EXCLUDED.clan_changes, role_changes = EXCLUDED.role_changes, \
             avg_trophy_delta = EXCLUDED.avg_trophy_delta, \
             avg_donations_made = EXCLUDED.avg_donations_made, \
             avg_donations_received = EXCLUDED.avg_donations_received, \
             consistency_score = EXCLUDED.consistency_score, computed_at = NOW()",
            SUMMARY_COLUMNS
        );

        sqlx::query(&query)
            .bind(&summary.player_tag)
            .bind(summary.period_type.to_string())
            .bind(summary.period_start)
            .bind(summary.period_end)
            .bind(i32::try_from(summary.days_recorded).unwrap_or(i32::MAX))
            .bind(i32::try_from(summary.active_days).unwrap_or(i32::MAX))
            .bind(summary.trophy_delta)
            .bind(to_db(summary.exp_gained))
            .bind(to_db(summary.attack_wins))
            .bind(to_db(summary.defense_wins))
            .bind(to_db(summary.war_stars))
            .bind(to_db(summary.donations_made))
            .bind(to_db(summary.donations_received))
            .bind(to_db(summary.gold_farmed))
            .bind(to_db(summary.elixir_farmed))
            .bind(to_db(summary.dark_elixir_farmed))
            .bind(to_db(summary.capital_gold_farmed))
            .bind(to_db(summary.buildings_destroyed))
            .bind(to_db(summary.obstacles_removed))
            .bind(i32::try_from(summary.clan_changes).unwrap_or(i32::MAX))
            .bind(i32::try_from(summary.role_changes).unwrap_or(i32::MAX))
            .bind(summary.avg_trophy_delta)
            .bind(summary.avg_donations_made)
            .bind(summary.avg_donations_received)
            .bind(summary.consistency_score)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to store period summary");
                AppError::DatabaseError(e.to_string())
            })?;

        debug!("Period summary stored");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_summary(
        &self,
        player_tag: &str,
        period_type: PeriodType,
        period_start: NaiveDate,
    ) -> Result<Option<PeriodSummary>, AppError> {
        let query = format!(
            "SELECT {} FROM period_summaries \
             WHERE player_tag = $1 AND period_type = $2 AND period_start = $3",
            SUMMARY_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(player_tag)
            .bind(period_type.to_string())
            .bind(period_start)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(summary_from_row).transpose()
    }
}
