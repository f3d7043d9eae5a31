//! Data layer: dataset model and loading.
//!
//! Architecture:
//! ```text
//!  .csv / .geojson
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  parse file → Dataset (+ geometries)
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  Dataset  │  ordered epochs, one value per unit, nodata sentinel
//!   └──────────┘
//! ```

pub mod loader;
pub mod model;
