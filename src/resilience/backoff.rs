//! Retry delay calculation.

use std::time::Duration;

use rand::Rng;

/// Exponential delay for retry number `retry` (1-based), with 0-10% jitter.
///
/// `base * 2^(retry - 1)`, capped at `max` before jitter is added.
pub fn exponential_delay(retry: u32, base: Duration, max: Duration) -> Duration {
    if retry == 0 {
        return Duration::ZERO;
    }

    let factor = 2u32.saturating_pow(retry - 1);
    let capped = base.saturating_mul(factor).min(max);

    let jitter_ceiling = capped / 10;
    if jitter_ceiling.is_zero() {
        return capped;
    }
    let jitter = rand::thread_rng().gen_range(Duration::ZERO..jitter_ceiling);
    capped + jitter
}
