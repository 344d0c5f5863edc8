use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::achievement::AchievementEvaluator;
use crate::activity::ActivityTracker;
use crate::jobs::Pipeline;
use crate::period::PeriodService;

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub period_service: Arc<PeriodService>,
    pub evaluator: Arc<AchievementEvaluator>,
    pub activity_tracker: Arc<ActivityTracker>,
    /// Cancelled on shutdown; on-demand job runs observe it too
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        pipeline: Arc<Pipeline>,
        period_service: Arc<PeriodService>,
        evaluator: Arc<AchievementEvaluator>,
        activity_tracker: Arc<ActivityTracker>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            pipeline,
            period_service,
            evaluator,
            activity_tracker,
            shutdown,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal server error")]
    Internal,
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::DatabaseError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Database error: {}", msg),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}

/// Calendar day of `now` as seen from the configured offset.
pub fn calendar_day(now: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    now.with_timezone(&offset).date_naive()
}

/// Postgres has no unsigned integers; counters are stored as BIGINT.
pub(crate) fn to_db(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

pub(crate) fn from_db(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}
