use crate::shared::config::SyncConfig;
use rand::Rng;
use std::time::Duration;

/// Bounded exponential backoff plus the transient-failure budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_backoff: Duration,
    max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_retries,
            base_backoff,
            max_backoff: max_backoff.max(base_backoff),
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.base_backoff_ms),
            Duration::from_millis(config.max_backoff_ms),
        )
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// True once a mutation has failed transiently more often than the budget allows.
    pub fn is_exhausted(&self, retry_count: u32) -> bool {
        retry_count > self.max_retries
    }

    /// `min(base * 2^attempt, max)` without jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 2_u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Base delay plus up to a quarter of it again as random jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let delay = self.base_delay(attempt);
        let spread = (delay.as_millis() / 4) as u64;
        if spread == 0 {
            return delay;
        }
        let jitter = rand::thread_rng().gen_range(0..=spread);
        delay + Duration::from_millis(jitter)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}
