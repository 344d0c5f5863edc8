// Library crate for the clanstats metrics pipeline
// This file exposes the public API for the binary and integration tests

pub mod achievement;
pub mod activity;
pub mod client;
pub mod config;
pub mod delta;
pub mod http;
pub mod jobs;
pub mod notification;
pub mod passport;
pub mod period;
pub mod shared;
pub mod snapshot;

// Re-export commonly used types for easier access in tests
pub use achievement::{AchievementCatalog, AchievementEvaluator};
pub use activity::ActivityTracker;
pub use client::{FetchError, GameDataClient, PlayerPayload};
pub use config::Config;
pub use delta::{DailyDelta, DeltaService};
pub use jobs::{DeltaReport, IngestReport, Pipeline, RollupReport};
pub use notification::{NotificationBus, NotificationEvent, NotificationSink};
pub use period::{PeriodService, PeriodSummary, PeriodType};
pub use shared::{AppError, AppState};
pub use snapshot::{PlayerSnapshot, SnapshotStore};
