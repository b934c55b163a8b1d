use std::time::Duration;

use rand::Rng;

/// Reconnection delay curve: `base * 2^(attempt-1)`, capped at `max`, with a
/// `jitter` share of the delay randomized downwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
    pub jitter: f64,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration, jitter: f64) -> Self {
        Self { base, max, jitter: jitter.clamp(0.0, 1.0) }
    }

    /// Upper bound of the delay before reconnection attempt `attempt`
    /// (1-based).
    pub fn ceiling(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let scaled = self.base.as_secs_f64() * f64::from(1u32 << exponent);
        Duration::from_secs_f64(scaled.min(self.max.as_secs_f64()))
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        let ceiling = self.ceiling(attempt).as_secs_f64();
        if self.jitter == 0.0 || ceiling == 0.0 {
            return Duration::from_secs_f64(ceiling);
        }
        let randomized = rand::rng().random_range(0.0..=ceiling);
        Duration::from_secs_f64(ceiling * (1.0 - self.jitter) + randomized * self.jitter)
    }
}
