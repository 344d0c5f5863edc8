use chrono::{NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use super::{
    report::{PlayerFailure, RollupReport},
    Pipeline,
};
use crate::notification::NotificationEvent;
use crate::period::{PeriodType, PeriodWindow};
use crate::shared::AppError;

enum RollupOutcome {
    Aggregated { report_sent: bool },
    Failed(String),
    Cancelled,
}

impl Pipeline {
    /// Rolls up the period for every player with deltas inside it and sends
    /// a period report to each bound subject.
    #[instrument(skip(self, cancel))]
    pub async fn aggregate_period(
        &self,
        period_type: PeriodType,
        period_start: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<RollupReport, AppError> {
        let window = PeriodWindow::new(period_type, period_start)?;
        let players = self.periods.players_in(&window).await?;
        let mut report = RollupReport::start(period_type, period_start, players.len());

        info!(run_id = %report.run_id, players = players.len(), "Period rollup started");

        let outcomes: Vec<(String, RollupOutcome)> = stream::iter(players)
            .map(|player_tag| async move {
                let outcome = self.rollup_player(&player_tag, &window, cancel).await;
                (player_tag, outcome)
            })
            .buffer_unordered(self.ingest.concurrency.max(1))
            .collect()
            .await;

        for (player_tag, outcome) in outcomes {
            match outcome {
                RollupOutcome::Aggregated { report_sent } => {
                    report.aggregated += 1;
                    report.reports_sent += usize::from(report_sent);
                }
                RollupOutcome::Failed(error) => report.failures.push(PlayerFailure {
                    player_tag,
                    error,
                    attempts: 1,
                }),
                RollupOutcome::Cancelled => report.cancelled += 1,
            }
        }

        report
            .failures
            .sort_by(|a, b| a.player_tag.cmp(&b.player_tag));
        report.finished_at = Utc::now();

        info!(
            run_id = %report.run_id,
            aggregated = report.aggregated,
            reports_sent = report.reports_sent,
            failed = report.failures.len(),
            cancelled = report.cancelled,
            "Period rollup finished"
        );
        Ok(report)
    }

    async fn rollup_player(
        &self,
        player_tag: &str,
        window: &PeriodWindow,
        cancel: &CancellationToken,
    ) -> RollupOutcome {
        if cancel.is_cancelled() {
            return RollupOutcome::Cancelled;
        }

        let summary = match self
            .periods
            .aggregate(player_tag, window.period_type, window.start)
            .await
        {
            Ok(summary) => summary,
            Err(e) => return RollupOutcome::Failed(e.to_string()),
        };

        if !summary.has_data() {
            return RollupOutcome::Aggregated { report_sent: false };
        }

        let subject_id = match self.directory.subject_for_player(player_tag).await {
            Ok(Some(subject_id)) => subject_id,
            Ok(None) => return RollupOutcome::Aggregated { report_sent: false },
            Err(e) => return RollupOutcome::Failed(e.to_string()),
        };

        let event = NotificationEvent::PeriodReport {
            subject_id,
            period_type: window.period_type,
            summary,
        };
        let report_sent = match self.sink.notify(event).await {
            Ok(()) => true,
            Err(e) => {
                warn!(player_tag = %player_tag, error = %e, "Period report notification failed");
                false
            }
        };

        RollupOutcome::Aggregated { report_sent }
    }
}
