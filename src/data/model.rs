use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::{Error, Result};

/// Default sentinel marking a missing sample.
pub const DEFAULT_NODATA: f64 = -9999.0;

// ---------------------------------------------------------------------------
// Epoch – one labelled time step
// ---------------------------------------------------------------------------

/// One time step: a label and one sample per unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Epoch {
    pub label: String,
    pub values: Vec<f64>,
}

impl Epoch {
    pub fn new(label: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            label: label.into(),
            values,
        }
    }
}

// ---------------------------------------------------------------------------
// Dataset – the complete multi-temporal input
// ---------------------------------------------------------------------------

/// Multi-temporal dataset: epochs in source order, all aligned by unit index.
///
/// Epoch order is the order the loader saw the columns in. Adjacency for
/// interval extraction follows that order, labels are never parsed as dates.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    epochs: Vec<Epoch>,
    nodata: f64,
}

impl Dataset {
    /// Build a dataset, checking label uniqueness, equal lengths and finiteness.
    pub fn new(epochs: Vec<Epoch>, nodata: f64) -> Result<Self> {
        if !nodata.is_finite() {
            return Err(Error::invalid("nodata", nodata, "must be finite"));
        }
        let Some(first) = epochs.first() else {
            return Err(Error::EmptyDataset);
        };
        let expected = first.values.len();

        let mut labels = BTreeSet::new();
        for epoch in &epochs {
            if !labels.insert(epoch.label.as_str()) {
                return Err(Error::DuplicateEpoch(epoch.label.clone()));
            }
            if epoch.values.len() != expected {
                return Err(Error::RaggedDataset {
                    epoch: epoch.label.clone(),
                    expected,
                    found: epoch.values.len(),
                });
            }
            if let Some(unit) = epoch.values.iter().position(|v| !v.is_finite()) {
                return Err(Error::NonFiniteValue {
                    epoch: epoch.label.clone(),
                    unit,
                });
            }
        }

        Ok(Self { epochs, nodata })
    }

    pub fn epochs(&self) -> &[Epoch] {
        &self.epochs
    }

    pub fn nodata(&self) -> f64 {
        self.nodata
    }

    /// Number of epochs (columns).
    pub fn num_epochs(&self) -> usize {
        self.epochs.len()
    }

    /// Number of units (rows).
    pub fn num_units(&self) -> usize {
        self.epochs.first().map_or(0, |e| e.values.len())
    }

    pub fn is_nodata(&self, value: f64) -> bool {
        value == self.nodata
    }

    /// The samples of one unit across all epochs, in epoch order.
    pub fn unit_series(&self, unit: usize) -> impl Iterator<Item = f64> + '_ {
        self.epochs.iter().map(move |e| e.values[unit])
    }

    /// All samples that are not the nodata sentinel.
    pub fn valid_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.epochs
            .iter()
            .flat_map(|e| e.values.iter().copied())
            .filter(move |&v| !self.is_nodata(v))
    }

    /// Global `(min, max)` over valid samples, `None` if everything is nodata.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.valid_values().fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}
