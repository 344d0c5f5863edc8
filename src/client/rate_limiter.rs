use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// Fixed-window request limiter shared by every worker of a client.
///
/// At most `limit` permits are handed out per `window`; callers over the
/// limit wait for the next window instead of failing.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    limit: u32,
    window: Duration,
    state: Mutex<WindowState>,
}

#[derive(Debug)]
struct WindowState {
    started_at: Instant,
    used: u32,
}

impl FixedWindowLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit: limit.max(1),
            window,
            state: Mutex::new(WindowState {
                started_at: Instant::now(),
                used: 0,
            }),
        }
    }

    pub async fn acquire(&self) {
        loop {
            let wait_until = {
                let mut state = self.state.lock().await;
                let now = Instant::now();

                if now.duration_since(state.started_at) >= self.window {
                    state.started_at = now;
                    state.used = 0;
                }

                if state.used < self.limit {
                    state.used += 1;
                    return;
                }

                state.started_at + self.window
            };

            debug!(
                wait_ms = wait_until
                    .saturating_duration_since(Instant::now())
                    .as_millis() as u64,
                "Request window exhausted, waiting"
            );
            sleep_until(wait_until).await;
        }
    }
}
