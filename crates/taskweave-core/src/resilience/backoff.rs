//! Inter-attempt delay strategies for `Retry`.

use std::sync::Arc;
use std::time::Duration;

use taskweave_types::config::BackoffConfig;

/// Computes the delay before the next attempt from the zero-based index of
/// the attempt that just failed.
pub trait BackoffStrategy: Send + Sync + std::fmt::Debug {
    fn delay(&self, attempt: u32) -> Duration;
}

/// Shared, type-erased backoff strategy.
pub type BoxBackoff = Arc<dyn BackoffStrategy>;

/// Same delay between every attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedBackoff {
    pub delay: Duration,
}

impl FixedBackoff {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl BackoffStrategy for FixedBackoff {
    fn delay(&self, _attempt: u32) -> Duration {
        self.delay
    }
}

/// `base + attempt * increment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearBackoff {
    pub base: Duration,
    pub increment: Duration,
}

impl LinearBackoff {
    pub fn new(base: Duration, increment: Duration) -> Self {
        Self { base, increment }
    }
}

impl BackoffStrategy for LinearBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        self.base
            .saturating_add(self.increment.saturating_mul(attempt))
    }
}

/// `base * factor * attempt`, capped at `max`.
///
/// The attempt index multiplies rather than exponentiates, so the first gap
/// (attempt 0) has no delay and growth is linear in the attempt index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialBackoff {
    pub base: Duration,
    pub factor: f64,
    pub max: Duration,
}

impl ExponentialBackoff {
    pub fn new(base: Duration, factor: f64, max: Duration) -> Self {
        Self { base, factor, max }
    }
}

impl BackoffStrategy for ExponentialBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        let nanos = (self.base.as_nanos() as f64 * self.factor * f64::from(attempt)).round();
        // Negative, NaN, or overflowing products fall back to the cap.
        if !(0.0..=self.max.as_nanos() as f64).contains(&nanos) {
            return self.max;
        }
        Duration::from_nanos(nanos as u64)
    }
}

/// Build a strategy from its configuration section.
pub fn from_config(config: &BackoffConfig) -> BoxBackoff {
    match *config {
        BackoffConfig::Fixed { delay_ms } => {
            Arc::new(FixedBackoff::new(Duration::from_millis(delay_ms)))
        }
        BackoffConfig::Linear {
            base_ms,
            increment_ms,
        } => Arc::new(LinearBackoff::new(
            Duration::from_millis(base_ms),
            Duration::from_millis(increment_ms),
        )),
        BackoffConfig::Exponential {
            base_ms,
            factor,
            max_ms,
        } => Arc::new(ExponentialBackoff::new(
            Duration::from_millis(base_ms),
            factor,
            Duration::from_millis(max_ms),
        )),
    }
}
