pub mod clash;
mod errors;
pub mod payload;
pub mod rate_limiter;

use async_trait::async_trait;

pub use clash::ClashApiClient;
pub use errors::FetchError;
pub use payload::{AchievementPayload, ClanPayload, LeaguePayload, PlayerPayload};
pub use rate_limiter::FixedWindowLimiter;

/// Source of point-in-time player state
#[async_trait]
pub trait GameDataClient: Send + Sync {
    async fn fetch_player(&self, player_tag: &str) -> Result<PlayerPayload, FetchError>;
}
