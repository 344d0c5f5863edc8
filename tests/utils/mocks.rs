use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use clanstats::{
    client::{FetchError, GameDataClient, PlayerPayload},
    notification::{NotificationError, NotificationEvent, NotificationSink},
    snapshot::normalize_tag,
};

// ============================================================================
// Mock Infrastructure
// ============================================================================

type FetchResult = Result<PlayerPayload, FetchError>;

#[derive(Default)]
struct PlayerScript {
    /// Consumed first, one per call
    queued: VecDeque<FetchResult>,
    /// Returned once the queue is empty
    fallback: Option<FetchResult>,
}

/// Game client with per-player scripted responses. Unknown players are
/// reported as not found.
#[derive(Clone, Default)]
pub struct ScriptedGameClient {
    scripts: Arc<RwLock<HashMap<String, PlayerScript>>>,
    calls: Arc<RwLock<HashMap<String, u32>>>,
    latency: Arc<RwLock<Duration>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl ScriptedGameClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call for this player returns the payload
    pub async fn set_player(&self, player_tag: &str, payload: PlayerPayload) {
        self.scripts
            .write()
            .await
            .entry(normalize_tag(player_tag))
            .or_default()
            .fallback = Some(Ok(payload));
    }

    /// Every call for this player fails
    pub async fn fail_always(&self, player_tag: &str, error: FetchError) {
        self.scripts
            .write()
            .await
            .entry(normalize_tag(player_tag))
            .or_default()
            .fallback = Some(Err(error));
    }

    /// The next `times` calls fail before the fallback applies
    pub async fn fail_next(&self, player_tag: &str, times: u32, error: FetchError) {
        let mut scripts = self.scripts.write().await;
        let script = scripts.entry(normalize_tag(player_tag)).or_default();
        for _ in 0..times {
            script.queued.push_back(Err(error.clone()));
        }
    }

    pub async fn calls(&self, player_tag: &str) -> u32 {
        self.calls
            .read()
            .await
            .get(&normalize_tag(player_tag))
            .copied()
            .unwrap_or(0)
    }

    pub async fn total_calls(&self) -> u32 {
        self.calls.read().await.values().sum()
    }

    /// Every fetch holds its slot for `latency` before answering
    pub async fn set_latency(&self, latency: Duration) {
        *self.latency.write().await = latency;
    }

    /// Highest number of fetches that were running at the same time
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    async fn respond(&self, tag: String) -> Result<PlayerPayload, FetchError> {
        *self.calls.write().await.entry(tag.clone()).or_insert(0) += 1;

        let mut scripts = self.scripts.write().await;
        let Some(script) = scripts.get_mut(&tag) else {
            return Err(FetchError::NotFound(tag));
        };

        if let Some(result) = script.queued.pop_front() {
            return result;
        }
        script
            .fallback
            .clone()
            .unwrap_or(Err(FetchError::NotFound(tag)))
    }
}

#[async_trait]
impl GameDataClient for ScriptedGameClient {
    async fn fetch_player(&self, player_tag: &str) -> Result<PlayerPayload, FetchError> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);

        let latency = *self.latency.read().await;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        let result = self.respond(normalize_tag(player_tag)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Sink that keeps every event for assertions
#[derive(Clone, Default)]
pub struct RecordingSink {
    events: Arc<RwLock<Vec<NotificationEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<NotificationEvent> {
        self.events.read().await.clone()
    }

    pub async fn unlocked_keys(&self) -> Vec<String> {
        self.events
            .read()
            .await
            .iter()
            .filter_map(|event| match event {
                NotificationEvent::AchievementUnlocked {
                    achievement_key, ..
                } => Some(achievement_key.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn period_reports(&self) -> Vec<NotificationEvent> {
        self.events
            .read()
            .await
            .iter()
            .filter(|event| matches!(event, NotificationEvent::PeriodReport { .. }))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, event: NotificationEvent) -> Result<(), NotificationError> {
        self.events.write().await.push(event);
        Ok(())
    }
}

/// Sink whose delivery always fails
pub struct FailingSink;

#[async_trait]
impl NotificationSink for FailingSink {
    async fn notify(&self, _event: NotificationEvent) -> Result<(), NotificationError> {
        Err(NotificationError::Delivery("chat unavailable".to_string()))
    }
}
