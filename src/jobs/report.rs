use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::period::PeriodType;

/// One player that could not be processed in a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerFailure {
    pub player_tag: String,
    pub error: String,
    pub attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub run_id: Uuid,
    pub day: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    /// New snapshot stored, or the day was already recorded
    pub succeeded: usize,
    /// Stored snapshots whose content differs from the previous one
    pub changed: usize,
    /// Unknown to the game API; not retried this cycle
    pub not_found: Vec<String>,
    pub failures: Vec<PlayerFailure>,
    pub cancelled: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaReport {
    pub run_id: Uuid,
    pub day: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub computed: usize,
    /// No snapshot for the previous day
    pub skipped: usize,
    pub achievements_awarded: usize,
    pub failures: Vec<PlayerFailure>,
    pub cancelled: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollupReport {
    pub run_id: Uuid,
    pub period_type: PeriodType,
    pub period_start: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub aggregated: usize,
    pub reports_sent: usize,
    pub failures: Vec<PlayerFailure>,
    pub cancelled: usize,
}

impl IngestReport {
    pub(crate) fn start(day: NaiveDate, total: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            day,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            total,
            succeeded: 0,
            changed: 0,
            not_found: Vec::new(),
            failures: Vec::new(),
            cancelled: 0,
        }
    }
}

impl DeltaReport {
    pub(crate) fn start(day: NaiveDate, total: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            day,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            total,
            computed: 0,
            skipped: 0,
            achievements_awarded: 0,
            failures: Vec::new(),
            cancelled: 0,
        }
    }
}

impl RollupReport {
    pub(crate) fn start(period_type: PeriodType, period_start: NaiveDate, total: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            period_type,
            period_start,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            total,
            aggregated: 0,
            reports_sent: 0,
            failures: Vec::new(),
            cancelled: 0,
        }
    }
}
