//! Retry policy for service initialization.
//!
//! # Responsibilities
//! - Decide how many attempts a service gets
//! - Compute the delay before each retry
//!
//! # Design Decisions
//! - `retry_count` extra attempts after the first (total = retry_count + 1)
//! - The delay is slept in full; it is not cut short by cancellation
//! - Cancellation and duplicate-init rejections are never retried

use std::time::Duration;

use crate::config::{BackoffStrategy, InitializerConfig};
use crate::error::LifecycleError;
use crate::resilience::backoff::exponential_delay;

/// How often and how patiently to retry a failed init.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first.
    pub retry_count: u32,
    /// Delay before a retry (base delay for exponential back-off).
    pub interval: Duration,
    /// Delay growth.
    pub strategy: BackoffStrategy,
    /// Cap for exponential back-off.
    pub max_interval: Duration,
}

impl RetryPolicy {
    /// Policy described by the initializer configuration.
    pub fn from_config(config: &InitializerConfig) -> Self {
        Self {
            retry_count: config.retry_count,
            interval: config.retry_interval(),
            strategy: config.backoff,
            max_interval: Duration::from_millis(config.max_retry_interval_ms),
        }
    }

    /// Total attempts, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.retry_count.saturating_add(1)
    }

    /// Delay before attempt `attempt` (0-based). The first attempt never waits.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        match self.strategy {
            BackoffStrategy::Fixed => self.interval,
            BackoffStrategy::Exponential => {
                exponential_delay(attempt, self.interval, self.max_interval)
            }
        }
    }

    /// Whether a failed attempt may be retried.
    pub fn is_retryable(error: &LifecycleError) -> bool {
        !matches!(error, LifecycleError::Cancelled { .. })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&InitializerConfig::default())
    }
}
