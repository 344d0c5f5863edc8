use chrono::{NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use std::collections::BTreeSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::{
    report::{IngestReport, PlayerFailure},
    Pipeline,
};
use crate::client::FetchError;
use crate::config::IngestConfig;
use crate::snapshot::{normalize_tag, SnapshotOutcome};

enum IngestOutcome {
    Recorded(SnapshotOutcome),
    NotFound,
    Failed { error: String, attempts: u32 },
    Cancelled,
}

impl Pipeline {
    /// Fetches and stores today's snapshot for every player.
    ///
    /// One player's failure never stops the others; cancellation is checked
    /// before each player and during retry waits.
    pub async fn ingest_all(
        &self,
        player_tags: &[String],
        cancel: &CancellationToken,
    ) -> IngestReport {
        self.ingest_all_on(player_tags, self.snapshots.today(), cancel)
            .await
    }

    #[instrument(skip(self, player_tags, cancel), fields(players = player_tags.len()))]
    pub async fn ingest_all_on(
        &self,
        player_tags: &[String],
        day: NaiveDate,
        cancel: &CancellationToken,
    ) -> IngestReport {
        let players: BTreeSet<String> = player_tags.iter().map(|t| normalize_tag(t)).collect();
        let mut report = IngestReport::start(day, players.len());

        info!(run_id = %report.run_id, day = %day, players = players.len(), "Ingestion started");

        let outcomes: Vec<(String, IngestOutcome)> = stream::iter(players)
            .map(|player_tag| async move {
                let outcome = self.ingest_player(&player_tag, day, cancel).await;
                (player_tag, outcome)
            })
            .buffer_unordered(self.ingest.concurrency.max(1))
            .collect()
            .await;

        for (player_tag, outcome) in outcomes {
            match outcome {
                IngestOutcome::Recorded(recorded) => {
                    report.succeeded += 1;
                    report.changed += usize::from(recorded.changed);
                }
                IngestOutcome::NotFound => report.not_found.push(player_tag),
                IngestOutcome::Failed { error, attempts } => report.failures.push(PlayerFailure {
                    player_tag,
                    error,
                    attempts,
                }),
                IngestOutcome::Cancelled => report.cancelled += 1,
            }
        }

        report.not_found.sort();
        report
            .failures
            .sort_by(|a, b| a.player_tag.cmp(&b.player_tag));
        report.finished_at = Utc::now();

        info!(
            run_id = %report.run_id,
            succeeded = report.succeeded,
            changed = report.changed,
            not_found = report.not_found.len(),
            failed = report.failures.len(),
            cancelled = report.cancelled,
            "Ingestion finished"
        );
        report
    }

    #[instrument(skip(self, cancel))]
    async fn ingest_player(
        &self,
        player_tag: &str,
        day: NaiveDate,
        cancel: &CancellationToken,
    ) -> IngestOutcome {
        if cancel.is_cancelled() {
            return IngestOutcome::Cancelled;
        }

        let max_attempts = self.ingest.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.client.fetch_player(player_tag).await {
                Ok(payload) => {
                    return match self
                        .snapshots
                        .record_snapshot_on(player_tag, &payload, day, Utc::now())
                        .await
                    {
                        Ok(outcome) => IngestOutcome::Recorded(outcome),
                        Err(e) => IngestOutcome::Failed {
                            error: e.to_string(),
                            attempts: attempt,
                        },
                    };
                }
                Err(FetchError::NotFound(_)) => {
                    debug!("Player not found, skipping this cycle");
                    return IngestOutcome::NotFound;
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = backoff_delay(&self.ingest, attempt);
                    warn!(
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Fetch failed, retrying"
                    );

                    tokio::select! {
                        _ = cancel.cancelled() => return IngestOutcome::Cancelled,
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(e) => {
                    warn!(attempt = attempt, error = %e, "Fetch failed, giving up");
                    return IngestOutcome::Failed {
                        error: e.to_string(),
                        attempts: attempt,
                    };
                }
            }
        }
    }
}

/// Exponential backoff with up to 50% random jitter
pub(crate) fn backoff_delay(config: &IngestConfig, attempt: u32) -> Duration {
    let base = config.base_backoff.as_millis() as u64;
    let exponential = base.saturating_mul(1u64 << attempt.saturating_sub(1).min(16));
    let jitter = if base == 0 {
        0
    } else {
        rand::random::<u64>() % (base / 2 + 1)
    };
    Duration::from_millis(exponential.saturating_add(jitter))
}
