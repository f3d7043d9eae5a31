//! Required vs. achieved class change for a single interval.

use super::interval::Interval;

/// Default sensitivity: a change of 1/20 of the value range justifies one class.
pub const DEFAULT_SENSITIVITY: f64 = 0.05;

/// Number of class boundaries the interval's magnitude justifies:
/// `floor(p * (hi - lo))`.
pub fn required_class_change(interval: &Interval, p: f64) -> u64 {
    (p * interval.width()).floor() as u64
}

/// Number of thresholds `t` with `lo <= t < hi`.
///
/// Equivalent to `class_of(hi) - class_of(lo)`; independent of the order of
/// `thresholds`.
pub fn achieved_class_change(interval: &Interval, thresholds: &[f64]) -> u64 {
    thresholds
        .iter()
        .filter(|&&t| interval.lo <= t && t < interval.hi)
        .count() as u64
}

/// Class index of a value: how many thresholds lie strictly below it.
pub fn class_of(value: f64, thresholds: &[f64]) -> usize {
    thresholds.iter().filter(|&&t| t < value).count()
}

/// Deviation weight. Intervals that should not change at all get the
/// largest possible class change as weight, so spurious flips cost most.
pub fn weight(required: u64, num_classes: usize) -> u64 {
    if required == 0 {
        num_classes as u64 - 1
    } else {
        required
    }
}
