//! Classification engine.
//!
//! ```text
//!   Dataset ──► interval::extract_intervals ──► pocc::PoccScorer
//!      │                                            │
//!      └──► interval::candidate_positions ──► search::search_breaks ──► PoccClassification
//!      │
//!      └──► equidistant::equidistant_classify ──► EquidistantClassification
//! ```

pub mod control;
pub mod equidistant;
pub mod interval;
pub mod metric;
pub mod pocc;
pub mod search;

pub use control::{CancelToken, ProgressSink, SearchMode, SearchOptions};
pub use equidistant::{EquidistantClassification, equidistant_classify};
pub use interval::{Interval, candidate_positions, extract_intervals};
pub use metric::DEFAULT_SENSITIVITY;
pub use pocc::{BreakScorer, PoccScorer, pocc_score};
pub use search::{PoccClassification, SearchPlan, binomial, pocc_classify, search_breaks};

use crate::error::{Error, Result};

/// Parameters shared by both classifiers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifyParams {
    pub num_classes: usize,
    /// Sensitivity: the fraction of a value change that counts as one class.
    pub p: f64,
}

impl Default for ClassifyParams {
    fn default() -> Self {
        Self {
            num_classes: 5,
            p: DEFAULT_SENSITIVITY,
        }
    }
}

impl ClassifyParams {
    pub fn validate(&self) -> Result<()> {
        if self.num_classes < 2 {
            return Err(Error::invalid("classes", self.num_classes, "at least 2 classes required"));
        }
        if !self.p.is_finite() || self.p < 0.0 {
            return Err(Error::invalid("p", self.p, "must be a finite, non-negative fraction"));
        }
        Ok(())
    }
}
