//! Visualization hook: classified GeoJSON output.
//!
//! Geometries are copied through untouched. Each feature gets two
//! properties keyed by epoch label, `pocc_class` (class index or `null` for
//! nodata) and `pocc_color` (ramp colour, grey for nodata).

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde_json::{Map, Value as JsonValue, json};

use crate::classify::metric::class_of;
use crate::color::ClassColorMap;
use crate::data::model::Dataset;

/// Build the classified FeatureCollection.
pub fn classified_feature_collection(
    dataset: &Dataset,
    geometries: &[JsonValue],
    thresholds: &[f64],
) -> Result<JsonValue> {
    if geometries.len() != dataset.num_units() {
        bail!(
            "{} geometries for {} units",
            geometries.len(),
            dataset.num_units()
        );
    }

    let mut sorted = thresholds.to_vec();
    sorted.sort_by(f64::total_cmp);
    let colors = ClassColorMap::new(sorted.len() + 1);

    let features: Vec<JsonValue> = geometries
        .iter()
        .enumerate()
        .map(|(unit, geometry)| {
            let mut classes = Map::new();
            let mut fills = Map::new();
            for epoch in dataset.epochs() {
                let value = epoch.values[unit];
                let class = (!dataset.is_nodata(value)).then(|| class_of(value, &sorted));
                classes.insert(epoch.label.clone(), json!(class));
                fills.insert(epoch.label.clone(), json!(colors.color_for(class)));
            }
            json!({
                "type": "Feature",
                "geometry": geometry,
                "properties": {
                    "pocc_class": classes,
                    "pocc_color": fills,
                },
            })
        })
        .collect();

    Ok(json!({
        "type": "FeatureCollection",
        "pocc_breaks": sorted,
        "pocc_legend": colors
            .legend_entries()
            .into_iter()
            .map(|(class, color)| json!({ "class": class, "color": color }))
            .collect::<Vec<_>>(),
        "features": features,
    }))
}

/// Write the classified FeatureCollection to `path`.
pub fn write_classified_geojson(
    dataset: &Dataset,
    geometries: &[JsonValue],
    thresholds: &[f64],
    path: &Path,
) -> Result<()> {
    let collection = classified_feature_collection(dataset, geometries, thresholds)?;
    let file = File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &collection)
        .context("writing GeoJSON")?;
    log::info!("classified features written to {}", path.display());
    Ok(())
}
