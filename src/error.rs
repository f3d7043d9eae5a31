use std::time::Duration;

use thiserror::Error;

/// Error kinds raised by loading, validation and the break search.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("missing required parameter: {name}")]
    MissingParameter { name: &'static str },

    #[error("can't read .{extension} files, please supply csv or geojson")]
    UnsupportedFormat { extension: String },

    #[error("no significant change at sensitivity p = {p}: every interval requires zero class change")]
    NoSignificantChange { p: f64 },

    #[error("dataset yields no intervals (fewer than two epochs or only nodata transitions)")]
    NoIntervals,

    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("epoch '{epoch}' has {found} values, expected {expected}")]
    RaggedDataset {
        epoch: String,
        expected: usize,
        found: usize,
    },

    #[error("duplicate epoch label: {0}")]
    DuplicateEpoch(String),

    #[error("non-finite value in epoch '{epoch}' at unit {unit}")]
    NonFiniteValue { epoch: String, unit: usize },

    #[error("dataset contains no usable values")]
    EmptyDataset,

    #[error("not enough candidate positions: {available} available, {required} breaks required")]
    NotEnoughCandidates { available: usize, required: usize },

    #[error("break search cancelled")]
    Cancelled,

    #[error("break search exceeded time limit of {limit:?}")]
    TimedOut { limit: Duration },
}

impl Error {
    pub(crate) fn invalid(name: &'static str, value: impl ToString, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for classification operations.
pub type Result<T> = std::result::Result<T, Error>;
