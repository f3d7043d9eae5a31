use serde::Serialize;

use crate::data::model::Dataset;
use crate::error::{Error, Result};

/// Equal-width baseline.
///
/// Unlike [`PoccClassification`](super::PoccClassification) this holds the
/// `num_classes + 1` class boundaries including the outer range, not the
/// internal thresholds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquidistantClassification {
    pub boundaries: Vec<f64>,
}

impl EquidistantClassification {
    /// The `num_classes - 1` inner boundaries, comparable to POCC thresholds.
    pub fn internal_thresholds(&self) -> &[f64] {
        let n = self.boundaries.len();
        if n < 2 {
            return &[];
        }
        &self.boundaries[1..n - 1]
    }
}

/// `min + i * (max - min) / num_classes` for `i` in `0..=num_classes`.
pub fn equidistant_boundaries(min: f64, max: f64, num_classes: usize) -> Vec<f64> {
    let step = (max - min) / num_classes as f64;
    (0..=num_classes)
        .map(|i| min + i as f64 * step)
        .collect()
}

/// Equal-width classes over the dataset's valid value range.
pub fn equidistant_classify(dataset: &Dataset, num_classes: usize) -> Result<EquidistantClassification> {
    if num_classes < 1 {
        return Err(Error::invalid("num_classes", num_classes, "at least 1 class required"));
    }
    let (min, max) = dataset.value_range().ok_or(Error::EmptyDataset)?;
    Ok(EquidistantClassification {
        boundaries: equidistant_boundaries(min, max, num_classes),
    })
}
