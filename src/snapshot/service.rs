use chrono::{DateTime, Days, FixedOffset, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::{
    models::{PlayerSnapshot, SnapshotOutcome},
    repository::SnapshotRepository,
    SnapshotError,
};
use crate::client::PlayerPayload;
use crate::shared::{calendar_day, AppError};

/// Daily snapshot persistence with change detection
pub struct SnapshotStore {
    repository: Arc<dyn SnapshotRepository>,
    day_offset: FixedOffset,
}

impl SnapshotStore {
    pub fn new(repository: Arc<dyn SnapshotRepository>, day_offset: FixedOffset) -> Self {
        Self {
            repository,
            day_offset,
        }
    }

    pub fn today(&self) -> NaiveDate {
        calendar_day(Utc::now(), self.day_offset)
    }

    /// Records the payload as today's snapshot for the player.
    pub async fn record_snapshot(
        &self,
        player_tag: &str,
        payload: &PlayerPayload,
    ) -> Result<SnapshotOutcome, SnapshotError> {
        let now = Utc::now();
        self.record_snapshot_on(player_tag, payload, calendar_day(now, self.day_offset), now)
            .await
    }

    #[instrument(skip(self, payload))]
    pub async fn record_snapshot_on(
        &self,
        player_tag: &str,
        payload: &PlayerPayload,
        day: NaiveDate,
        fetched_at: DateTime<Utc>,
    ) -> Result<SnapshotOutcome, SnapshotError> {
        let snapshot = PlayerSnapshot::from_payload(player_tag, payload, day, fetched_at)
            .inspect_err(|e| warn!(error = %e, "Dropping malformed payload"))?;

        if self
            .repository
            .get_snapshot(&snapshot.player_tag, day)
            .await?
            .is_some()
        {
            debug!("Snapshot for this day already stored");
            return Ok(SnapshotOutcome {
                stored: false,
                changed: false,
            });
        }

        let changed = match self
            .repository
            .latest_before(&snapshot.player_tag, day)
            .await?
        {
            Some(previous) => previous.fingerprint != snapshot.fingerprint,
            None => true,
        };

        // a concurrent writer for the same day wins the unique key
        let stored = self.repository.insert_snapshot(&snapshot).await?;

        debug!(stored = stored, changed = changed, "Snapshot recorded");
        Ok(SnapshotOutcome {
            stored,
            changed: stored && changed,
        })
    }

    pub async fn get_snapshot(
        &self,
        player_tag: &str,
        day: NaiveDate,
    ) -> Result<Option<PlayerSnapshot>, AppError> {
        self.repository.get_snapshot(player_tag, day).await
    }

    pub async fn players_on(&self, day: NaiveDate) -> Result<Vec<String>, AppError> {
        self.repository.players_on(day).await
    }

    /// Deletes snapshots dated more than `retention_days` before `today`
    #[instrument(skip(self))]
    pub async fn cleanup_older_than(
        &self,
        today: NaiveDate,
        retention_days: u32,
    ) -> Result<u64, AppError> {
        let cutoff = today
            .checked_sub_days(Days::new(u64::from(retention_days)))
            .unwrap_or(NaiveDate::MIN);

        let removed = self.repository.delete_before(cutoff).await?;
        info!(cutoff = %cutoff, removed = removed, "Snapshot retention cleanup finished");
        Ok(removed)
    }
}
