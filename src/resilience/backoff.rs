//! Exponential backoff between origin attempts.

use std::time::Duration;

/// Delay to sleep after the attempt with index `attempt_index` (0-based) failed.
///
/// Equals `base * 2^attempt_index`, capped at `max`.
pub fn calculate_backoff(attempt_index: u32, base: Duration, max: Duration) -> Duration {
    let factor = 2u32.saturating_pow(attempt_index);
    base.saturating_mul(factor).min(max)
}
