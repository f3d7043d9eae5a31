//! POCC (Preservation Of Class Change) score.
//!
//! ```text
//! score = 1 - Σ w(c_req) * |c_req - c_ach|  /  Σ w(c_req) * c_req
//! ```
//!
//! A break set that reproduces every required change scores exactly 1.
//! The score has no lower bound.

use super::interval::Interval;
use super::metric::{achieved_class_change, required_class_change, weight};
use crate::error::{Error, Result};

/// Anything that can rate a candidate threshold set; higher is better.
pub trait BreakScorer: Sync {
    fn score(&self, thresholds: &[f64]) -> f64;
}

#[derive(Debug, Clone, Copy)]
struct WeightedInterval {
    interval: Interval,
    required: u64,
    weight: f64,
}

/// POCC scorer with the break-independent parts computed once.
///
/// Requirement, weight and denominator depend only on the intervals,
/// `p` and the class count, so a search evaluates just the numerator per
/// candidate.
#[derive(Debug, Clone)]
pub struct PoccScorer {
    intervals: Vec<WeightedInterval>,
    denominator: f64,
}

impl PoccScorer {
    pub fn new(intervals: &[Interval], num_classes: usize, p: f64) -> Result<Self> {
        if intervals.is_empty() {
            return Err(Error::NoIntervals);
        }
        if num_classes < 2 {
            return Err(Error::invalid("num_classes", num_classes, "at least 2 classes required"));
        }

        let intervals: Vec<WeightedInterval> = intervals
            .iter()
            .map(|iv| {
                let required = required_class_change(iv, p);
                WeightedInterval {
                    interval: *iv,
                    required,
                    weight: weight(required, num_classes) as f64,
                }
            })
            .collect();

        let denominator: f64 = intervals
            .iter()
            .map(|wi| wi.weight * wi.required as f64)
            .sum();
        if denominator == 0.0 {
            return Err(Error::NoSignificantChange { p });
        }

        Ok(Self {
            intervals,
            denominator,
        })
    }

    /// Weighted deviation sum Σ w * |c_req - c_ach|.
    pub fn deviation(&self, thresholds: &[f64]) -> f64 {
        self.intervals
            .iter()
            .map(|wi| {
                let achieved = achieved_class_change(&wi.interval, thresholds);
                wi.weight * wi.required.abs_diff(achieved) as f64
            })
            .sum()
    }

    pub fn denominator(&self) -> f64 {
        self.denominator
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }
}

impl BreakScorer for PoccScorer {
    fn score(&self, thresholds: &[f64]) -> f64 {
        1.0 - self.deviation(thresholds) / self.denominator
    }
}

/// POCC of `thresholds` over `intervals`; the class count is `thresholds.len() + 1`.
pub fn pocc_score(intervals: &[Interval], thresholds: &[f64], p: f64) -> Result<f64> {
    let scorer = PoccScorer::new(intervals, thresholds.len() + 1, p)?;
    Ok(scorer.score(thresholds))
}
