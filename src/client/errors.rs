use thiserror::Error;

/// Failure modes of a single player fetch
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Player not found: {0}")]
    NotFound(String),

    #[error("Rate limited on every configured credential")]
    RateLimited,

    #[error("Transient fetch error: {0}")]
    Transient(String),

    #[error("Could not decode player payload: {0}")]
    Decode(String),
}

impl FetchError {
    /// Whether the batch should retry this player with backoff
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::RateLimited | FetchError::Transient(_))
    }
}
