use std::time::Duration;

use anyhow::anyhow;

use super::StdResult;

/// Settings of a concurrent issue fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    /// The number of workers fetching pages concurrently.
    pub worker_count: usize,

    /// The minimum spacing between two page dispatches.
    pub dispatch_interval: Duration,

    /// The minimum delay to wait after the API throttled a call.
    pub min_throttle_delay: Duration,

    /// The upper bound of the random delay added to `min_throttle_delay`.
    pub throttle_jitter: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            worker_count: 3,
            dispatch_interval: Duration::from_secs(1) / 3,
            min_throttle_delay: Duration::from_secs(30),
            throttle_jitter: Duration::from_secs(30),
        }
    }
}

impl FetchConfig {
    /// Checks that the settings allow a fetch to make progress.
    pub fn validate(&self) -> StdResult<()> {
        if self.worker_count == 0 {
            return Err(anyhow!("At least one worker is required"));
        }
        if self.dispatch_interval.is_zero() {
            return Err(anyhow!("The dispatch interval must be greater than zero"));
        }

        Ok(())
    }
}
