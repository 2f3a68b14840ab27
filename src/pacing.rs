//! Request pacing: a minimum gap between consecutive remote calls.
//!
//! Hosted vision models enforce per-minute quotas. Rather than discover the
//! quota by hitting 429s, every call first passes through a [`RateLimiter`]
//! that sleeps until `interval` has elapsed since the previous call. The
//! limiter is an explicit object shared by handle (`Arc<RateLimiter>`), so
//! every scheduler talking to the same service can share one gate.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// Fixed-interval gate in front of a remote service.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_request: Mutex::new(None),
        }
    }

    /// A limiter that never waits.
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until a new request is allowed, then claim the slot.
    ///
    /// The lock is held across the wait, so concurrent callers queue up and
    /// each one is spaced `interval` after the previous.
    pub async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let ready_at = prev + self.interval;
            if ready_at > Instant::now() {
                debug!(
                    "Pacing: waiting {:?} before next request",
                    ready_at - Instant::now()
                );
                sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}
