//! Retry budget and linear backoff for portal lookups

use std::time::Duration;

/// How many times a transient failure is retried, and how long to wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Additional attempts after the first one.
    pub max_retries: u32,
    /// Base delay; the n-th retry waits `retry_delay * n`.
    pub retry_delay: Duration,
}

impl RetryConfig {
    pub const fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
        }
    }

    /// Total physical attempts one logical lookup may use.
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        backoff_duration(self.retry_delay, attempt)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(2, Duration::from_secs(1))
    }
}

/// Linear backoff: base × attempt (1s, 2s, 3s, ... for a 1s base)
pub fn backoff_duration(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(attempt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_linear() {
        let base = Duration::from_millis(500);
        assert_eq!(backoff_duration(base, 1), Duration::from_millis(500));
        assert_eq!(backoff_duration(base, 2), Duration::from_secs(1));
        assert_eq!(backoff_duration(base, 3), Duration::from_millis(1500));
    }

    #[test]
    fn backoff_zero_base() {
        assert_eq!(backoff_duration(Duration::ZERO, 7), Duration::ZERO);
    }

    #[test]
    fn attempts_include_first() {
        let cfg = RetryConfig::new(2, Duration::from_secs(1));
        assert_eq!(cfg.max_attempts(), 3);
        assert_eq!(cfg.backoff(2), Duration::from_secs(2));
    }
}
