//! Retry Policy
//!
//! Exponential backoff used while the bot waits for its first configuration.

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use std::time::Duration;

/// Deterministic exponential backoff: `base`, `base * multiplier`, ... capped at `cap`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// First delay
    pub base: Duration,

    /// Largest delay
    pub cap: Duration,

    /// Growth factor between attempts
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(60),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap: cap.max(base),
            ..Default::default()
        }
    }

    /// Backoff generator with no jitter and no elapsed-time limit.
    ///
    /// The startup window is enforced by the caller against the runtime
    /// clock, so the generator never gives up on its own.
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.base,
            initial_interval: self.base,
            randomization_factor: 0.0,
            multiplier: self.multiplier,
            max_interval: self.cap,
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    /// The first `attempts` delays this policy produces
    pub fn schedule(&self, attempts: usize) -> Vec<Duration> {
        let mut backoff = self.backoff();
        (0..attempts)
            .map(|_| backoff.next_backoff().unwrap_or(self.cap))
            .collect()
    }
}
