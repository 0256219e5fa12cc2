//! Multiplicative backoff helpers.

/// Failure-aware delay estimate: `base_wait_ms * multiplier ^ failures`.
///
/// Saturates at `u64::MAX` instead of overflowing.
pub fn failure_backoff(base_wait_ms: u64, multiplier: f64, failures: u32) -> u64 {
    if base_wait_ms == 0 {
        return 0;
    }
    let factor = multiplier.powi(failures.min(i32::MAX as u32) as i32);
    let delay = base_wait_ms as f64 * factor;
    if delay.is_finite() && delay < u64::MAX as f64 {
        delay.round() as u64
    } else {
        u64::MAX
    }
}

/// Grow an interval by `multiplier`, capped at `max_ms`.
pub fn grow(interval_ms: u64, multiplier: f64, max_ms: u64) -> u64 {
    let grown = (interval_ms as f64 * multiplier).round();
    if grown.is_finite() && grown < max_ms as f64 {
        grown as u64
    } else {
        max_ms
    }
}

/// Shrink an interval by `multiplier`, floored at `min_ms`.
pub fn decay(interval_ms: u64, multiplier: f64, min_ms: u64) -> u64 {
    if multiplier <= 1.0 {
        return interval_ms.max(min_ms);
    }
    let shrunk = (interval_ms as f64 / multiplier).round() as u64;
    shrunk.max(min_ms)
}
