//! Retry ceiling and exponential backoff for failed queue entries.

use std::time::Duration;

/// Retry behavior applied when a queue entry fails with a non-conflict error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Automatic retries stop once `attempts` exceeds this ceiling
    pub max_attempts: u32,
    /// Delay after the first failure
    pub base_delay: Duration,
    /// Cap for exponential growth
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Backoff before the next automatic attempt, given the attempts made so far.
    ///
    /// `base * 2^attempts`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempts: u32) -> Duration {
        let factor = 2_u32.checked_pow(attempts).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Whether an entry with `attempts` failures has exhausted automatic retries
    pub const fn is_exhausted(&self, attempts: u32) -> bool {
        attempts > self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(300),
        }
    }
}
