use chrono::{NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use super::{
    report::{DeltaReport, PlayerFailure},
    Pipeline,
};
use crate::shared::AppError;

enum DeltaOutcome {
    Computed { awarded: usize },
    Skipped,
    Failed(String),
    Cancelled,
}

impl Pipeline {
    /// Computes the delta for `day` of every player with a snapshot that day,
    /// then evaluates achievements of the owning subjects.
    #[instrument(skip(self, cancel))]
    pub async fn compute_deltas_all(
        &self,
        day: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<DeltaReport, AppError> {
        let players = self.snapshots.players_on(day).await?;
        let mut report = DeltaReport::start(day, players.len());

        info!(run_id = %report.run_id, players = players.len(), "Delta computation started");

        let outcomes: Vec<(String, DeltaOutcome)> = stream::iter(players)
            .map(|player_tag| async move {
                let outcome = self.delta_for_player(&player_tag, day, cancel).await;
                (player_tag, outcome)
            })
            .buffer_unordered(self.ingest.concurrency.max(1))
            .collect()
            .await;

        for (player_tag, outcome) in outcomes {
            match outcome {
                DeltaOutcome::Computed { awarded } => {
                    report.computed += 1;
                    report.achievements_awarded += awarded;
                }
                DeltaOutcome::Skipped => report.skipped += 1,
                DeltaOutcome::Failed(error) => report.failures.push(PlayerFailure {
                    player_tag,
                    error,
                    attempts: 1,
                }),
                DeltaOutcome::Cancelled => report.cancelled += 1,
            }
        }

        report
            .failures
            .sort_by(|a, b| a.player_tag.cmp(&b.player_tag));
        report.finished_at = Utc::now();

        info!(
            run_id = %report.run_id,
            computed = report.computed,
            skipped = report.skipped,
            awarded = report.achievements_awarded,
            failed = report.failures.len(),
            cancelled = report.cancelled,
            "Delta computation finished"
        );
        Ok(report)
    }

    async fn delta_for_player(
        &self,
        player_tag: &str,
        day: NaiveDate,
        cancel: &CancellationToken,
    ) -> DeltaOutcome {
        if cancel.is_cancelled() {
            return DeltaOutcome::Cancelled;
        }

        match self.deltas.compute_delta(player_tag, day).await {
            Ok(Some(_)) => {}
            Ok(None) => return DeltaOutcome::Skipped,
            Err(e) => {
                warn!(player_tag = %player_tag, error = %e, "Delta computation failed");
                return DeltaOutcome::Failed(e.to_string());
            }
        }

        let subject_id = match self.directory.subject_for_player(player_tag).await {
            Ok(Some(subject_id)) => subject_id,
            Ok(None) => return DeltaOutcome::Computed { awarded: 0 },
            Err(e) => return DeltaOutcome::Failed(e.to_string()),
        };

        match self.evaluator.evaluate(&subject_id).await {
            Ok(awarded) => DeltaOutcome::Computed {
                awarded: awarded.len(),
            },
            Err(e) => {
                warn!(subject_id = %subject_id, error = %e, "Achievement evaluation failed");
                DeltaOutcome::Failed(e.to_string())
            }
        }
    }
}
