use serde::Serialize;

use crate::data::model::Dataset;

/// A unit's before/after values across two adjacent epochs, stored as `(lo, hi)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Interval {
    pub lo: f64,
    pub hi: f64,
}

impl Interval {
    /// Build from two samples in either order.
    pub fn new(a: f64, b: f64) -> Self {
        if a <= b {
            Self { lo: a, hi: b }
        } else {
            Self { lo: b, hi: a }
        }
    }

    pub fn width(&self) -> f64 {
        self.hi - self.lo
    }
}

/// Every epoch-to-epoch transition of every unit, skipping any pair that
/// touches nodata. Duplicates are kept: multiplicity weighs into the score.
pub fn extract_intervals(dataset: &Dataset) -> Vec<Interval> {
    let mut intervals = Vec::with_capacity(
        dataset.num_units() * dataset.num_epochs().saturating_sub(1),
    );
    let mut row = Vec::with_capacity(dataset.num_epochs());

    for unit in 0..dataset.num_units() {
        row.clear();
        row.extend(dataset.unit_series(unit));
        for pair in row.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if dataset.is_nodata(a) || dataset.is_nodata(b) {
                continue;
            }
            intervals.push(Interval::new(a, b));
        }
    }

    log::debug!(
        "extracted {} intervals from {} units x {} epochs",
        intervals.len(),
        dataset.num_units(),
        dataset.num_epochs()
    );
    intervals
}

/// Distinct valid values of the dataset, sorted ascending.
///
/// The sort fixes the enumeration order of the break search and with it
/// which of several equally scoring break sets is reported.
pub fn candidate_positions(dataset: &Dataset) -> Vec<f64> {
    let mut values: Vec<f64> = dataset.valid_values().collect();
    values.sort_by(f64::total_cmp);
    // -0.0 and 0.0 are one position
    values.dedup_by(|a, b| a == b);
    values
}
