//! Change-preserving class breaks for multi-temporal data.
//!
//! Two classifications are produced for a [`Dataset`](data::model::Dataset):
//! an equal-width baseline and the break set that maximizes POCC
//! (Preservation Of Class Change), found by exhaustive search.

pub mod classify;
pub mod color;
pub mod data;
pub mod error;
pub mod export;

pub use error::{Error, Result};
