//! Outbound request throttling.
//!
//! Every API client owns one [`RequestGate`] sized to that provider's
//! documented limit and calls [`RequestGate::acquire`] before each request.
//! The gate is a fixed window: when the window's capacity is spent, callers
//! sleep out the remainder and retry. The tokio mutex queues waiters fairly,
//! so concurrent callers drain in arrival order; a request that later fails
//! has already consumed its slot and cannot stall anyone behind it.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

pub struct RequestGate {
    name: &'static str,
    limit: u32,
    window: Duration,
    state: Mutex<WindowState>,
}

struct WindowState {
    window_start: Instant,
    count: u32,
}

impl RequestGate {
    #[must_use]
    pub fn new(name: &'static str, limit: u32, window: Duration) -> Self {
        Self {
            name,
            limit,
            window,
            state: Mutex::new(WindowState {
                window_start: Instant::now(),
                count: 0,
            }),
        }
    }

    /// Wait until the current window has a free slot, then claim it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(state.window_start);

                if elapsed >= self.window {
                    state.window_start = now;
                    state.count = 0;
                }

                if state.count < self.limit {
                    state.count += 1;
                    return;
                }

                self.window.saturating_sub(elapsed)
            };

            trace!(
                gate = self.name,
                wait_ms = wait.as_millis() as u64,
                "Rate window exhausted, waiting"
            );
            tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
        }
    }
}
