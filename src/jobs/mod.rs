pub mod deltas;
pub mod ingest;
pub mod report;
pub mod rollup;
pub mod scheduler;

pub use report::{DeltaReport, IngestReport, PlayerFailure, RollupReport};
pub use scheduler::{next_run_at, spawn_schedulers};

use chrono::NaiveDate;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::achievement::AchievementEvaluator;
use crate::client::GameDataClient;
use crate::config::{IngestConfig, ScheduleConfig};
use crate::delta::DeltaService;
use crate::notification::{NoOpNotificationSink, NotificationSink};
use crate::passport::PassportDirectory;
use crate::period::PeriodService;
use crate::shared::AppError;
use crate::snapshot::SnapshotStore;

/// Batch jobs over all tracked players
pub struct Pipeline {
    client: Arc<dyn GameDataClient>,
    snapshots: Arc<SnapshotStore>,
    deltas: Arc<DeltaService>,
    periods: Arc<PeriodService>,
    evaluator: Arc<AchievementEvaluator>,
    directory: Arc<dyn PassportDirectory>,
    sink: Arc<dyn NotificationSink>,
    ingest: IngestConfig,
    schedule: ScheduleConfig,
}

impl Pipeline {
    pub fn builder(
        client: Arc<dyn GameDataClient>,
        snapshots: Arc<SnapshotStore>,
        deltas: Arc<DeltaService>,
        periods: Arc<PeriodService>,
        evaluator: Arc<AchievementEvaluator>,
        directory: Arc<dyn PassportDirectory>,
    ) -> PipelineBuilder {
        PipelineBuilder {
            client,
            snapshots,
            deltas,
            periods,
            evaluator,
            directory,
            sink: Arc::new(NoOpNotificationSink),
            ingest: IngestConfig::default(),
            schedule: ScheduleConfig::default(),
        }
    }

    /// Calendar day snapshots are currently filed under
    pub fn today(&self) -> NaiveDate {
        self.snapshots.today()
    }

    pub fn schedule(&self) -> &ScheduleConfig {
        &self.schedule
    }

    /// Ingests every player known to the passport directory
    pub async fn ingest_tracked(
        &self,
        cancel: &CancellationToken,
    ) -> Result<IngestReport, AppError> {
        self.ingest_tracked_on(self.today(), cancel).await
    }

    /// Same as [`Pipeline::ingest_tracked`], filing snapshots under `day`
    pub async fn ingest_tracked_on(
        &self,
        day: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<IngestReport, AppError> {
        let players = self.directory.tracked_players().await?;
        Ok(self.ingest_all_on(&players, day, cancel).await)
    }

    /// Applies the configured snapshot retention relative to `today`
    pub async fn cleanup_snapshots(&self, today: NaiveDate) -> Result<u64, AppError> {
        self.snapshots
            .cleanup_older_than(today, self.schedule.snapshot_retention_days)
            .await
    }
}

pub struct PipelineBuilder {
    client: Arc<dyn GameDataClient>,
    snapshots: Arc<SnapshotStore>,
    deltas: Arc<DeltaService>,
    periods: Arc<PeriodService>,
    evaluator: Arc<AchievementEvaluator>,
    directory: Arc<dyn PassportDirectory>,
    sink: Arc<dyn NotificationSink>,
    ingest: IngestConfig,
    schedule: ScheduleConfig,
}

impl PipelineBuilder {
    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_ingest_config(mut self, ingest: IngestConfig) -> Self {
        self.ingest = ingest;
        self
    }

    pub fn with_schedule(mut self, schedule: ScheduleConfig) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            client: self.client,
            snapshots: self.snapshots,
            deltas: self.deltas,
            periods: self.periods,
            evaluator: self.evaluator,
            directory: self.directory,
            sink: self.sink,
            ingest: self.ingest,
            schedule: self.schedule,
        }
    }
}
