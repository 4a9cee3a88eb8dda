//! Progress fractions derived from the interval list and remaining time.
//!
//! Pure functions: all values are in milliseconds and every result is
//! clamped to `0.0 ..= 1.0`.

use super::session::{Interval, Session};

/// Fraction of `interval` already elapsed. Zero-length intervals report 0.
pub fn interval_progress(interval: &Interval, remaining_ms: u64) -> f64 {
    let total = interval.duration_ms();
    if total == 0 {
        return 0.0;
    }
    clamp_unit(1.0 - remaining_ms as f64 / total as f64)
}

/// Fraction of the whole session elapsed.
///
/// `session.intervals` must already be in run order. Once `index` has run
/// past the last interval the result is exactly 1.0, even for a session
/// whose intervals are all zero-length.
pub fn overall_progress(session: Option<&Session>, index: usize, remaining_ms: u64) -> f64 {
    let Some(session) = session else {
        return 0.0;
    };
    if session.intervals.is_empty() {
        return 0.0;
    }
    if index >= session.intervals.len() {
        return 1.0;
    }
    let total = session.total_duration_ms();
    if total == 0 {
        return 0.0;
    }

    let mut completed = session.cumulative_ms(index);
    if let Some(current) = session.intervals.get(index) {
        completed = completed.saturating_add(current.duration_ms().saturating_sub(remaining_ms));
    }
    clamp_unit(completed as f64 / total as f64)
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}
