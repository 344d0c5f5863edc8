use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde_json::{json, Value};
use tracing::{info, instrument};

use super::types::{
    AchievementsResponse, ActivityRequest, IngestRequest, LeaderboardQuery, LeaderboardResponse,
    PeriodSummaryResponse,
};
use crate::activity::{ActivityOutcome, ChatActivity};
use crate::jobs::{DeltaReport, IngestReport, RollupReport};
use crate::period::PeriodType;
use crate::shared::{AppError, AppState};
use crate::snapshot::normalize_tag;

pub const NO_DATA_MESSAGE: &str = "no data available yet";

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// POST /jobs/ingest
///
/// Body `{"player_tags": [...]}` is optional; without it every tracked
/// player is ingested.
#[instrument(name = "trigger_ingest", skip(state, body))]
pub async fn trigger_ingest(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<IngestReport>, AppError> {
    let request: IngestRequest = if body.is_empty() {
        IngestRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::Validation(format!("invalid ingest request: {}", e)))?
    };

    let report = match request.player_tags {
        Some(player_tags) => state.pipeline.ingest_all(&player_tags, &state.shutdown).await,
        None => state.pipeline.ingest_tracked(&state.shutdown).await?,
    };

    info!(run_id = %report.run_id, succeeded = report.succeeded, "On-demand ingestion done");
    Ok(Json(report))
}

/// POST /jobs/deltas/:day
#[instrument(name = "trigger_deltas", skip(state))]
pub async fn trigger_deltas(
    State(state): State<AppState>,
    Path(day): Path<NaiveDate>,
) -> Result<Json<DeltaReport>, AppError> {
    let report = state
        .pipeline
        .compute_deltas_all(day, &state.shutdown)
        .await?;
    Ok(Json(report))
}

/// POST /jobs/aggregate/:period/:start
#[instrument(name = "trigger_aggregate", skip(state))]
pub async fn trigger_aggregate(
    State(state): State<AppState>,
    Path((period_type, period_start)): Path<(PeriodType, NaiveDate)>,
) -> Result<Json<RollupReport>, AppError> {
    let report = state
        .pipeline
        .aggregate_period(period_type, period_start, &state.shutdown)
        .await?;
    Ok(Json(report))
}

/// GET /players/:tag/periods/:period/:start
///
/// Computed from stored deltas on read; nothing is persisted.
#[instrument(name = "get_period_summary", skip(state))]
pub async fn get_period_summary(
    State(state): State<AppState>,
    Path((player_tag, period_type, period_start)): Path<(String, PeriodType, NaiveDate)>,
) -> Result<Json<PeriodSummaryResponse>, AppError> {
    let player_tag = normalize_tag(&player_tag);
    let summary = state
        .period_service
        .summarize(&player_tag, period_type, period_start)
        .await?;

    let response = if summary.has_data() {
        PeriodSummaryResponse {
            player_tag,
            period_type,
            period_start,
            summary: Some(summary),
            message: None,
        }
    } else {
        PeriodSummaryResponse {
            player_tag,
            period_type,
            period_start,
            summary: None,
            message: Some(NO_DATA_MESSAGE.to_string()),
        }
    };
    Ok(Json(response))
}

/// POST /subjects/:id/activity
#[instrument(name = "record_activity", skip(state))]
pub async fn record_activity(
    State(state): State<AppState>,
    Path(subject_id): Path<String>,
    Json(request): Json<ActivityRequest>,
) -> Result<Json<ActivityOutcome>, AppError> {
    let outcome = match request.kind {
        ChatActivity::Message => state.activity_tracker.record_message(&subject_id).await?,
        ChatActivity::HelpfulAction => {
            state
                .activity_tracker
                .record_helpful_action(&subject_id)
                .await?
        }
    };

    if !outcome.newly_awarded.is_empty() {
        info!(
            subject_id = %subject_id,
            awarded = outcome.newly_awarded.len(),
            "Chat activity unlocked achievements"
        );
    }
    Ok(Json(outcome))
}

/// GET /subjects/:id/achievements
#[instrument(name = "get_achievements", skip(state))]
pub async fn get_achievements(
    State(state): State<AppState>,
    Path(subject_id): Path<String>,
) -> Result<Json<AchievementsResponse>, AppError> {
    let profile = state.evaluator.profile(&subject_id).await?;
    let progress = state.evaluator.progress(&subject_id).await?;
    let awards = state.evaluator.awards(&subject_id).await?;

    Ok(Json(AchievementsResponse {
        profile,
        progress,
        awards,
    }))
}

/// GET /leaderboard?limit=N
#[instrument(name = "get_leaderboard", skip(state))]
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    let limit = query.limit.unwrap_or(LeaderboardQuery::DEFAULT_LIMIT);
    if limit == 0 || limit > LeaderboardQuery::MAX_LIMIT {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and {}",
            LeaderboardQuery::MAX_LIMIT
        )));
    }

    let entries = state.evaluator.leaderboard(limit).await?;
    Ok(Json(LeaderboardResponse { entries }))
}
