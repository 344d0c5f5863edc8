use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::{FetchError, FixedWindowLimiter, GameDataClient, PlayerPayload};
use crate::config::ClashApiConfig;
use crate::shared::AppError;
use crate::snapshot::normalize_tag;

/// HTTP client for the Clash of Clans API.
///
/// Holds every configured API key and rotates to the next one when the
/// current key is throttled or rejected. All requests share one limiter.
pub struct ClashApiClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Vec<String>,
    current: AtomicUsize,
    limiter: Arc<FixedWindowLimiter>,
}

impl ClashApiClient {
    pub fn new(config: &ClashApiConfig) -> Result<Self, AppError> {
        if config.tokens.is_empty() {
            return Err(AppError::Validation(
                "at least one API token is required".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| {
                warn!(error = %e, "Failed to build HTTP client");
                AppError::Internal
            })?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tokens: config.tokens.clone(),
            current: AtomicUsize::new(0),
            limiter: Arc::new(FixedWindowLimiter::new(
                config.rate_limit,
                config.rate_window,
            )),
        })
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    fn player_url(&self, player_tag: &str) -> String {
        let encoded = normalize_tag(player_tag).replace('#', "%23");
        format!("{}/players/{}", self.base_url, encoded)
    }

    fn current_token(&self) -> (usize, &str) {
        let index = self.current.load(Ordering::Relaxed) % self.tokens.len();
        (index, self.tokens[index].as_str())
    }

    /// Moves to the key after `from`; a concurrent rotation already past it wins
    fn rotate_from(&self, from: usize) {
        let next = (from + 1) % self.tokens.len();
        let _ = self
            .current
            .compare_exchange(from, next, Ordering::Relaxed, Ordering::Relaxed);
    }
}

#[async_trait]
impl GameDataClient for ClashApiClient {
    #[instrument(skip(self))]
    async fn fetch_player(&self, player_tag: &str) -> Result<PlayerPayload, FetchError> {
        let url = self.player_url(player_tag);

        for attempt in 0..self.tokens.len() {
            self.limiter.acquire().await;
            let (index, token) = self.current_token();

            debug!(attempt = attempt, key_index = index, "Requesting player");

            let response = self
                .http
                .get(&url)
                .bearer_auth(token)
                .send()
                .await
                .map_err(|e| FetchError::Transient(e.to_string()))?;

            match response.status() {
                StatusCode::OK => {
                    return response
                        .json::<PlayerPayload>()
                        .await
                        .map_err(|e| FetchError::Decode(e.to_string()));
                }
                StatusCode::NOT_FOUND => {
                    debug!("Player not found");
                    return Err(FetchError::NotFound(normalize_tag(player_tag)));
                }
                StatusCode::TOO_MANY_REQUESTS | StatusCode::FORBIDDEN => {
                    warn!(
                        status = response.status().as_u16(),
                        key_index = index,
                        "API key throttled or rejected, rotating"
                    );
                    self.rotate_from(index);
                }
                status => {
                    return Err(FetchError::Transient(format!(
                        "unexpected status {}",
                        status.as_u16()
                    )));
                }
            }
        }

        warn!(keys = self.tokens.len(), "Every API key is rate limited");
        Err(FetchError::RateLimited)
    }
}
