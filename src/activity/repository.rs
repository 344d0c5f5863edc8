use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{postgres::PgRow, PgConnection, PgPool, Row};
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use super::models::{ActivityCounters, CounterContribution};
use crate::shared::{from_db, to_db, AppError};

#[async_trait]
pub trait ActivityRepository: Send + Sync {
    async fn get_counters(&self, subject_id: &str) -> Result<Option<ActivityCounters>, AppError>;

    /// Applies a player's contribution for `day` exactly once.
    /// Returns false when (player, day) was already applied.
    async fn apply_daily_contribution(
        &self,
        subject_id: &str,
        player_tag: &str,
        day: NaiveDate,
        contribution: &CounterContribution,
    ) -> Result<bool, AppError>;

    /// Applies a chat event; every call counts
    async fn apply_event(
        &self,
        subject_id: &str,
        day: NaiveDate,
        contribution: &CounterContribution,
    ) -> Result<ActivityCounters, AppError>;
}

#[derive(Debug, Default)]
struct ActivityState {
    counters: HashMap<String, ActivityCounters>,
    ledger: HashSet<(String, NaiveDate)>,
}

/// In-memory implementation for development and testing.
/// One mutex covers counters and ledger so each apply is atomic.
#[derive(Debug, Default)]
pub struct InMemoryActivityRepository {
    state: Mutex<ActivityState>,
}

impl InMemoryActivityRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn ledger_len(&self) -> usize {
        self.state.lock().await.ledger.len()
    }
}

#[async_trait]
impl ActivityRepository for InMemoryActivityRepository {
    async fn get_counters(&self, subject_id: &str) -> Result<Option<ActivityCounters>, AppError> {
        let state = self.state.lock().await;
        Ok(state.counters.get(subject_id).cloned())
    }

    #[instrument(skip(self, contribution))]
    async fn apply_daily_contribution(
        &self,
        subject_id: &str,
        player_tag: &str,
        day: NaiveDate,
        contribution: &CounterContribution,
    ) -> Result<bool, AppError> {
        let mut state = self.state.lock().await;

        if !state.ledger.insert((player_tag.to_string(), day)) {
            debug!("Contribution already applied");
            return Ok(false);
        }

        state
            .counters
            .entry(subject_id.to_string())
            .or_insert_with(|| ActivityCounters::new(subject_id))
            .apply(contribution, day);

        debug!("Contribution applied in memory");
        Ok(true)
    }

    async fn apply_event(
        &self,
        subject_id: &str,
        day: NaiveDate,
        contribution: &CounterContribution,
    ) -> Result<ActivityCounters, AppError> {
        let mut state = self.state.lock().await;
        let counters = state
            .counters
            .entry(subject_id.to_string())
            .or_insert_with(|| ActivityCounters::new(subject_id));
        counters.apply(contribution, day);
        Ok(counters.clone())
    }
}

/// PostgreSQL implementation over `activity_counters` and `activity_ledger`
pub struct PostgresActivityRepository {
    pool: PgPool,
}

impl PostgresActivityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const COUNTER_COLUMNS: &str = "subject_id, total_messages, helpful_actions, gold_farmed, \
    elixir_farmed, dark_elixir_farmed, capital_gold_farmed, buildings_destroyed, \
    wars_participated, donations_made, current_streak, best_streak, last_activity_date";

fn counters_from_row(row: &PgRow) -> ActivityCounters {
    ActivityCounters {
        subject_id: row.get("subject_id"),
        total_messages: from_db(row.get("total_messages")),
        helpful_actions: from_db(row.get("helpful_actions")),
        gold_farmed: from_db(row.get("gold_farmed")),
        elixir_farmed: from_db(row.get("elixir_farmed")),
        dark_elixir_farmed: from_db(row.get("dark_elixir_farmed")),
        capital_gold_farmed: from_db(row.get("capital_gold_farmed")),
        buildings_destroyed: from_db(row.get("buildings_destroyed")),
        wars_participated: from_db(row.get("wars_participated")),
        donations_made: from_db(row.get("donations_made")),
        current_streak: from_db(row.get("current_streak")),
        best_streak: from_db(row.get("best_streak")),
        last_activity_date: row.get("last_activity_date"),
    }
}

/// Reads the counters row under a row lock, creating it when absent
async fn lock_counters(
    conn: &mut PgConnection,
    subject_id: &str,
) -> Result<ActivityCounters, AppError> {
    sqlx::query("INSERT INTO activity_counters (subject_id) VALUES ($1) ON CONFLICT DO NOTHING")
        .bind(subject_id)
        .execute(&mut *conn)
        .await?;

    let query = format!(
        "SELECT {} FROM activity_counters WHERE subject_id = $1 FOR UPDATE",
        COUNTER_COLUMNS
    );
    let row = sqlx::query(&query)
        .bind(subject_id)
        .fetch_one(&mut *conn)
        .await?;

    Ok(counters_from_row(&row))
}

async fn store_counters(
    conn: &mut PgConnection,
    counters: &ActivityCounters,
) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE activity_counters SET total_messages = $2, helpful_actions = $3, \
         gold_farmed = $4, elixir_farmed = $5, dark_elixir_farmed = $6, \
         capital_gold_farmed = $7, buildings_destroyed = $8, wars_participated = $9, \
         donations_made = $10, current_streak = $11, best_streak = $12, \
         last_activity_date = $13, updated_at = NOW() WHERE subject_id = $1",
    )
    .bind(&counters.subject_id)
    .bind(to_db(counters.total_messages))
    .bind(to_db(counters.helpful_actions))
    .bind(to_db(counters.gold_farmed))
    .bind(to_db(counters.elixir_farmed))
    .bind(to_db(counters.dark_elixir_farmed))
    .bind(to_db(counters.capital_gold_farmed))
    .bind(to_db(counters.buildings_destroyed))
    .bind(to_db(counters.wars_participated))
    .bind(to_db(counters.donations_made))
    .bind(to_db(counters.current_streak))
    .bind(to_db(counters.best_streak))
    .bind(counters.last_activity_date)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[async_trait]
impl ActivityRepository for PostgresActivityRepository {
    #[instrument(skip(self))]
    async fn get_counters(&self, subject_id: &str) -> Result<Option<ActivityCounters>, AppError> {
        let query = format!(
            "SELECT {} FROM activity_counters WHERE subject_id = $1",
            COUNTER_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(subject_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to fetch activity counters");
                AppError::DatabaseError(e.to_string())
            })?;

        Ok(row.as_ref().map(counters_from_row))
    }

    #[instrument(skip(self, contribution))]
    async fn apply_daily_contribution(
        &self,
        subject_id: &str,
        player_tag: &str,
        day: NaiveDate,
        contribution: &CounterContribution,
    ) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query(
            "INSERT INTO activity_ledger (player_tag, activity_date, subject_id) \
             VALUES ($1, $2, $3) ON CONFLICT (player_tag, activity_date) DO NOTHING",
        )
        .bind(player_tag)
        .bind(day)
        .bind(subject_id)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;

        if !claimed {
            tx.rollback().await?;
            debug!("Contribution already applied");
            return Ok(false);
        }

        let mut counters = lock_counters(&mut tx, subject_id).await?;
        counters.apply(contribution, day);
        store_counters(&mut tx, &counters).await?;

        tx.commit().await?;
        debug!("Contribution applied");
        Ok(true)
    }

    #[instrument(skip(self, contribution))]
    async fn apply_event(
        &self,
        subject_id: &str,
        day: NaiveDate,
        contribution: &CounterContribution,
    ) -> Result<ActivityCounters, AppError> {
        let mut tx = self.pool.begin().await?;

        let mut counters = lock_counters(&mut tx, subject_id).await?;
        counters.apply(contribution, day);
        store_counters(&mut tx, &counters).await?;

        tx.commit().await?;
        Ok(counters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn gold(amount: u64) -> CounterContribution {
        CounterContribution {
            gold: amount,
            active: true,
            ..CounterContribution::default()
        }
    }

    #[tokio::test]
    async fn daily_contribution_is_applied_once_per_player_day() {
        let repo = InMemoryActivityRepository::new();

        assert!(repo
            .apply_daily_contribution("subject-1", "#2PP", day(1), &gold(100))
            .await
            .unwrap());
        assert!(!repo
            .apply_daily_contribution("subject-1", "#2PP", day(1), &gold(100))
            .await
            .unwrap());

        let counters = repo.get_counters("subject-1").await.unwrap().unwrap();
        assert_eq!(counters.gold_farmed, 100);
        assert_eq!(repo.ledger_len().await, 1);
    }

    #[tokio::test]
    async fn two_accounts_of_one_subject_both_count() {
        let repo = InMemoryActivityRepository::new();

        repo.apply_daily_contribution("subject-1", "#MAIN", day(1), &gold(100))
            .await
            .unwrap();
        repo.apply_daily_contribution("subject-1", "#ALT", day(1), &gold(40))
            .await
            .unwrap();

        let counters = repo.get_counters("subject-1").await.unwrap().unwrap();
        assert_eq!(counters.gold_farmed, 140);
        assert_eq!(counters.current_streak, 1);
    }

    #[tokio::test]
    async fn every_chat_event_counts() {
        let repo = InMemoryActivityRepository::new();
        let message = CounterContribution {
            messages: 1,
            active: true,
            ..CounterContribution::default()
        };

        repo.apply_event("subject-1", day(1), &message).await.unwrap();
        let counters = repo.apply_event("subject-1", day(1), &message).await.unwrap();

        assert_eq!(counters.total_messages, 2);
        assert_eq!(counters.current_streak, 1);
    }
}
