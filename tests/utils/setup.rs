use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use clanstats::{
    achievement::{AchievementEvaluator, InMemoryAchievementRepository},
    activity::{ActivityTracker, InMemoryActivityRepository},
    config::{IngestConfig, ScheduleConfig},
    delta::{DeltaService, InMemoryDeltaRepository},
    jobs::Pipeline,
    notification::NotificationSink,
    passport::InMemoryPassportDirectory,
    period::{InMemoryPeriodSummaryRepository, PeriodService},
    shared::AppState,
    snapshot::{InMemorySnapshotRepository, SnapshotStore},
};

use super::mocks::{RecordingSink, ScriptedGameClient};

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

/// Fully wired pipeline over in-memory stores
pub struct TestSetup {
    pub client: Arc<ScriptedGameClient>,
    pub sink: Arc<RecordingSink>,
    pub directory: Arc<InMemoryPassportDirectory>,
    pub snapshot_repo: Arc<InMemorySnapshotRepository>,
    pub delta_repo: Arc<InMemoryDeltaRepository>,
    pub activity_repo: Arc<InMemoryActivityRepository>,
    pub award_repo: Arc<InMemoryAchievementRepository>,
    pub summary_repo: Arc<InMemoryPeriodSummaryRepository>,
    pub evaluator: Arc<AchievementEvaluator>,
    pub period_service: Arc<PeriodService>,
    pub tracker: Arc<ActivityTracker>,
    pub pipeline: Arc<Pipeline>,
}

impl TestSetup {
    pub fn app_state(&self) -> AppState {
        AppState::new(
            self.pipeline.clone(),
            self.period_service.clone(),
            self.evaluator.clone(),
            self.tracker.clone(),
            CancellationToken::new(),
        )
    }
}

pub struct TestSetupBuilder {
    ingest: IngestConfig,
    sink: Option<Arc<dyn NotificationSink>>,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            ingest: IngestConfig {
                concurrency: 4,
                max_attempts: 3,
                base_backoff: Duration::ZERO,
            },
            sink: None,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.ingest.concurrency = concurrency;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.ingest.max_attempts = max_attempts;
        self
    }

    pub fn with_backoff(mut self, base_backoff: Duration) -> Self {
        self.ingest.base_backoff = base_backoff;
        self
    }

    /// Replaces the recording sink on both the evaluator and the pipeline
    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> TestSetup {
        let schedule = ScheduleConfig::default();
        let client = Arc::new(ScriptedGameClient::new());
        let recording = Arc::new(RecordingSink::new());
        let sink: Arc<dyn NotificationSink> = self.sink.unwrap_or_else(|| recording.clone());

        let directory = Arc::new(InMemoryPassportDirectory::new());
        let snapshot_repo = Arc::new(InMemorySnapshotRepository::new());
        let delta_repo = Arc::new(InMemoryDeltaRepository::new());
        let activity_repo = Arc::new(InMemoryActivityRepository::new());
        let award_repo = Arc::new(InMemoryAchievementRepository::new());
        let summary_repo = Arc::new(InMemoryPeriodSummaryRepository::new());

        let evaluator = Arc::new(
            AchievementEvaluator::builder(activity_repo.clone(), award_repo.clone())
                .with_sink(sink.clone())
                .build(),
        );
        let snapshots = Arc::new(SnapshotStore::new(
            snapshot_repo.clone(),
            schedule.day_offset,
        ));
        let deltas = Arc::new(DeltaService::new(
            snapshot_repo.clone(),
            delta_repo.clone(),
            activity_repo.clone(),
            directory.clone(),
        ));
        let period_service = Arc::new(PeriodService::new(
            delta_repo.clone(),
            summary_repo.clone(),
        ));
        let tracker = Arc::new(ActivityTracker::new(
            activity_repo.clone(),
            evaluator.clone(),
            schedule.day_offset,
        ));

        let pipeline = Arc::new(
            Pipeline::builder(
                client.clone(),
                snapshots,
                deltas,
                period_service.clone(),
                evaluator.clone(),
                directory.clone(),
            )
            .with_sink(sink)
            .with_ingest_config(self.ingest)
            .with_schedule(schedule)
            .build(),
        );

        TestSetup {
            client,
            sink: recording,
            directory,
            snapshot_repo,
            delta_repo,
            activity_repo,
            award_repo,
            summary_repo,
            evaluator,
            period_service,
            tracker,
            pipeline,
        }
    }
}

impl Default for TestSetupBuilder {
    fn default() -> Self {
        Self::new()
    }
}
