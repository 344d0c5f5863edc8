pub mod bus;
pub mod events;
pub mod sink;

pub use bus::NotificationBus;
pub use events::NotificationEvent;
pub use sink::{NoOpNotificationSink, NotificationError, NotificationSink};
