use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, RwLock};
use tracing::{debug, info, instrument};

use super::{calculator, models::DailyDelta, repository::DeltaRepository};
use crate::activity::ActivityRepository;
use crate::passport::PassportDirectory;
use crate::shared::AppError;
use crate::snapshot::{normalize_tag, SnapshotRepository};

/// Computes and persists daily deltas and feeds them into activity counters.
///
/// Work for one player is serialized; different players run independently.
pub struct DeltaService {
    snapshots: Arc<dyn SnapshotRepository>,
    deltas: Arc<dyn DeltaRepository>,
    activity: Arc<dyn ActivityRepository>,
    directory: Arc<dyn PassportDirectory>,
    player_mutexes: Arc<RwLock<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl DeltaService {
    pub fn new(
        snapshots: Arc<dyn SnapshotRepository>,
        deltas: Arc<dyn DeltaRepository>,
        activity: Arc<dyn ActivityRepository>,
        directory: Arc<dyn PassportDirectory>,
    ) -> Self {
        Self {
            snapshots,
            deltas,
            activity,
            directory,
            player_mutexes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Delta for `day` against `day - 1`, or `None` when either snapshot is
    /// missing. Counters are incremented at most once per (player, day);
    /// a day already computed is returned as stored.
    #[instrument(skip(self))]
    pub async fn compute_delta(
        &self,
        player_tag: &str,
        day: NaiveDate,
    ) -> Result<Option<DailyDelta>, AppError> {
        let player_tag = normalize_tag(player_tag);
        let player_lock = self.player_lock(&player_tag).await;

        let result = {
            let _guard = player_lock.lock().await;
            self.compute_locked(&player_tag, day).await
        };

        self.release_player_lock(&player_tag, player_lock).await;
        result
    }

    async fn compute_locked(
        &self,
        player_tag: &str,
        day: NaiveDate,
    ) -> Result<Option<DailyDelta>, AppError> {
        if let Some(existing) = self.deltas.get_delta(player_tag, day).await? {
            debug!("Delta already computed");
            return Ok(Some(existing));
        }

        let Some(current) = self.snapshots.get_snapshot(player_tag, day).await? else {
            debug!("No snapshot for this day");
            return Ok(None);
        };

        let previous = match day.pred_opt() {
            Some(previous_day) => {
                self.snapshots
                    .get_snapshot(player_tag, previous_day)
                    .await?
            }
            None => None,
        };
        let Some(previous) = previous else {
            debug!("No snapshot for the previous day, first tracked day");
            return Ok(None);
        };

        let delta = calculator::compute(&previous, &current);

        // counters before the delta row: a retry after a crash in between
        // finds no delta, recomputes it and the ledger skips the increment
        match self.directory.subject_for_player(player_tag).await? {
            Some(subject_id) => {
                let applied = self
                    .activity
                    .apply_daily_contribution(&subject_id, player_tag, day, &delta.contribution())
                    .await?;
                debug!(subject_id = %subject_id, applied = applied, "Counters updated");
            }
            None => debug!("Player has no subject, counters untouched"),
        }

        self.deltas.insert_delta(&delta).await?;

        info!(
            trophy_delta = delta.trophy_delta,
            gold_farmed = delta.gold_farmed,
            active = delta.is_active(),
            "Daily delta computed"
        );
        Ok(Some(delta))
    }

    pub async fn get_delta(
        &self,
        player_tag: &str,
        day: NaiveDate,
    ) -> Result<Option<DailyDelta>, AppError> {
        self.deltas.get_delta(&normalize_tag(player_tag), day).await
    }

    async fn player_lock(&self, player_tag: &str) -> Arc<AsyncMutex<()>> {
        {
            let guard = self.player_mutexes.read().await;
            if let Some(lock) = guard.get(player_tag) {
                return lock.clone();
            }
        }

        let mut guard = self.player_mutexes.write().await;
        guard
            .entry(player_tag.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Drops the player's lock from the registry once no other call holds
    /// or waits on it.
    async fn release_player_lock(&self, player_tag: &str, lock: Arc<AsyncMutex<()>>) {
        let mut guard = self.player_mutexes.write().await;
        // one reference in the map, one here
        if Arc::strong_count(&lock) == 2 {
            guard.remove(player_tag);
        }
        // before the registry guard, so the next releaser sees an exact count
        drop(lock);
    }

    #[cfg(test)]
    async fn registered_locks(&self) -> usize {
        self.player_mutexes.read().await.len()
    }
}
