use std::time::Duration;

pub const DEFAULT_BASE: Duration = Duration::from_millis(400);
pub const DEFAULT_MULTIPLIER: f64 = 1.6;
pub const DEFAULT_RETRY_CAP: u32 = 6;

/// Geometric backoff for remote fetches: the delay after failed attempt `n`
/// is `base * multiplier^n`, and the failure of attempt `retry_cap` is final.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    base: Duration,
    multiplier: f64,
    retry_cap: u32,
}

impl Backoff {
    pub fn new(base: Duration, multiplier: f64, retry_cap: u32) -> Self {
        Self {
            base,
            multiplier: multiplier.max(1.0),
            retry_cap,
        }
    }

    pub fn retry_cap(&self) -> u32 {
        self.retry_cap
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
        self.base.mul_f64(self.multiplier.powi(exp).min(1e6))
    }

    /// Delay before retrying after `attempt` failed, or `None` when the
    /// failure is final.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        (attempt < self.retry_cap).then(|| self.delay(attempt))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DEFAULT_BASE, DEFAULT_MULTIPLIER, DEFAULT_RETRY_CAP)
    }
}
