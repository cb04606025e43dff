use std::time::Duration;

use tokio::{
    sync::Mutex,
    time::{Instant, Interval, MissedTickBehavior, interval_at},
};

/// A ticking gate admitting at most one dispatch per interval.
///
/// Admission instants are spaced by the interval, starting at construction.
/// Concurrent callers queue on the same clock.
pub struct DispatchRateLimiter {
    ticker: Mutex<Interval>,
}

impl DispatchRateLimiter {
    /// Creates a new `DispatchRateLimiter` with the given non-zero interval.
    pub fn new(dispatch_interval: Duration) -> Self {
        let mut ticker = interval_at(Instant::now(), dispatch_interval);
        // A late caller gets one admission, the next one is a full interval later.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self {
            ticker: Mutex::new(ticker),
        }
    }

    /// Waits for the next admission instant.
    pub async fn admit(&self) {
        let mut ticker = self.ticker.lock().await;
        ticker.tick().await;
    }
}
