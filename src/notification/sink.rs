use async_trait::async_trait;
use thiserror::Error;

use super::events::NotificationEvent;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Fire-and-forget receiver of unlock and report events.
/// Callers log failures and never retry.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, event: NotificationEvent) -> Result<(), NotificationError>;
}

/// Sink that drops every event
pub struct NoOpNotificationSink;

#[async_trait]
impl NotificationSink for NoOpNotificationSink {
    async fn notify(&self, _event: NotificationEvent) -> Result<(), NotificationError> {
        Ok(())
    }
}
