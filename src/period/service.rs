use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{
    aggregator,
    models::{PeriodSummary, PeriodType, PeriodWindow},
    repository::PeriodSummaryRepository,
};
use crate::delta::DeltaRepository;
use crate::shared::AppError;
use crate::snapshot::normalize_tag;

pub struct PeriodService {
    deltas: Arc<dyn DeltaRepository>,
    summaries: Arc<dyn PeriodSummaryRepository>,
}

impl PeriodService {
    pub fn new(
        deltas: Arc<dyn DeltaRepository>,
        summaries: Arc<dyn PeriodSummaryRepository>,
    ) -> Self {
        Self { deltas, summaries }
    }

    /// Recomputes the player's summary for the period and stores it
    #[instrument(skip(self))]
    pub async fn aggregate(
        &self,
        player_tag: &str,
        period_type: PeriodType,
        period_start: NaiveDate,
    ) -> Result<PeriodSummary, AppError> {
        let summary = self.summarize(player_tag, period_type, period_start).await?;
        self.summaries.upsert_summary(&summary).await?;

        debug!(
            days_recorded = summary.days_recorded,
            active_days = summary.active_days,
            "Period aggregated"
        );
        Ok(summary)
    }

    /// Same computation as `aggregate` without storing the result
    pub async fn summarize(
        &self,
        player_tag: &str,
        period_type: PeriodType,
        period_start: NaiveDate,
    ) -> Result<PeriodSummary, AppError> {
        let window = PeriodWindow::new(period_type, period_start)?;
        let player_tag = normalize_tag(player_tag);

        let deltas = self
            .deltas
            .deltas_between(&player_tag, window.start, window.end)
            .await?;

        Ok(aggregator::aggregate(&player_tag, &window, &deltas))
    }

    pub async fn get_summary(
        &self,
        player_tag: &str,
        period_type: PeriodType,
        period_start: NaiveDate,
    ) -> Result<Option<PeriodSummary>, AppError> {
        self.summaries
            .get_summary(&normalize_tag(player_tag), period_type, period_start)
            .await
    }

    /// Players with deltas inside the window
    pub async fn players_in(&self, window: &PeriodWindow) -> Result<Vec<String>, AppError> {
        self.deltas.players_between(window.start, window.end).await
    }
}
