//! Retry/poll policy for waiting on asynchronous vendor work.

use std::time::Duration;

/// Bounded polling schedule: growing delay, attempt ceiling, optional deadline.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    pub max_attempts: u32,
    pub deadline: Option<Duration>,
}

impl RetryPolicy {
    /// Constant interval, no deadline.
    pub fn fixed(interval: Duration, max_attempts: u32) -> Self {
        Self {
            initial_delay: interval,
            multiplier: 1.0,
            max_delay: interval,
            max_attempts,
            deadline: None,
        }
    }

    /// Delay to wait before poll number `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt.min(64) as i32);
        let nanos = self.initial_delay.as_nanos() as f64 * factor;
        let delay = Duration::from_nanos(nanos.min(u64::MAX as f64) as u64);
        delay.min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            multiplier: 1.5,
            max_delay: Duration::from_secs(5),
            max_attempts: 120,
            deadline: Some(Duration::from_secs(300)),
        }
    }
}
