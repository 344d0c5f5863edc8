use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{
    events::NotificationEvent,
    sink::{NotificationError, NotificationSink},
};

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast sink the chat layer subscribes to
#[derive(Debug, Clone)]
pub struct NotificationBus {
    sender: broadcast::Sender<NotificationEvent>,
}

impl NotificationBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.sender.subscribe()
    }

    /// Spawns a subscriber that writes every event to the log
    pub fn spawn_log_subscriber(&self) -> JoinHandle<()> {
        let mut receiver = self.subscribe();

        tokio::spawn(async move {
            info!("Notification log subscriber started");

            loop {
                match receiver.recv().await {
                    Ok(event) => info!(
                        subject_id = %event.subject_id(),
                        event_type = event.event_type(),
                        event = ?event,
                        "Notification"
                    ),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped = skipped, "Notification subscriber lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            warn!("Notification log subscriber ended");
        })
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationSink for NotificationBus {
    async fn notify(&self, event: NotificationEvent) -> Result<(), NotificationError> {
        let subject_id = event.subject_id().to_string();
        match self.sender.send(event) {
            Ok(receivers) => {
                debug!(subject_id = %subject_id, receivers = receivers, "Notification emitted");
            }
            Err(_) => {
                debug!(subject_id = %subject_id, "Notification emitted with no receivers");
            }
        }
        Ok(())
    }
}
