pub mod handlers;
pub mod types;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::shared::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/jobs/ingest", post(handlers::trigger_ingest))
        .route("/jobs/deltas/:day", post(handlers::trigger_deltas))
        .route(
            "/jobs/aggregate/:period/:start",
            post(handlers::trigger_aggregate),
        )
        .route(
            "/players/:tag/periods/:period/:start",
            get(handlers::get_period_summary),
        )
        .route("/subjects/:id/activity", post(handlers::record_activity))
        .route("/subjects/:id/achievements", get(handlers::get_achievements))
        .route("/leaderboard", get(handlers::get_leaderboard))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
