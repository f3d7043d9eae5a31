use std::path::Path;

use anyhow::{Context, Result, bail};
use serde_json::{Map, Value as JsonValue};

use super::model::{DEFAULT_NODATA, Dataset, Epoch};
use crate::error::Error;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Loader settings. Which fields are required depends on the input kind.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub nodata: f64,
    /// Tabular only: first column (0-indexed) holding epoch values.
    pub start_column: Option<usize>,
    /// Tabular only: field delimiter.
    pub delimiter: u8,
    /// Feature collection only: property names holding one epoch each.
    pub keys: Option<Vec<String>>,
    /// Feature collection only: list-valued property holding all epochs.
    pub values_key: Option<String>,
    /// Feature collection only: list-valued property naming the epochs.
    pub keys_key: Option<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            nodata: DEFAULT_NODATA,
            start_column: None,
            delimiter: b';',
            keys: None,
            values_key: None,
            keys_key: None,
        }
    }
}

/// Input kind, detected from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Tabular,
    FeatureCollection,
}

impl InputKind {
    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match ext.as_str() {
            "csv" => Ok(InputKind::Tabular),
            "geojson" | "json" => Ok(InputKind::FeatureCollection),
            _ => Err(Error::UnsupportedFormat { extension: ext }),
        }
    }
}

/// A loaded dataset plus the feature geometries, if the input had any.
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub dataset: Dataset,
    pub geometries: Option<Vec<JsonValue>>,
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a multi-temporal dataset from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`              – one row per unit, epoch columns from `start_column` on
/// * `.geojson` / `.json` – FeatureCollection, epochs taken from feature properties
///
/// Required options are checked before the file is opened.
pub fn load_file(path: &Path, opts: &LoadOptions) -> Result<LoadedDataset> {
    match InputKind::from_path(path)? {
        InputKind::Tabular => {
            let start_column = opts
                .start_column
                .ok_or(Error::MissingParameter { name: "startcolumn" })?;
            let dataset = load_csv(path, start_column, opts.delimiter, opts.nodata)?;
            Ok(LoadedDataset {
                dataset,
                geometries: None,
            })
        }
        InputKind::FeatureCollection => {
            if opts.keys.is_none() && opts.values_key.is_none() && opts.keys_key.is_none() {
                return Err(Error::MissingParameter { name: "keys or vkey" }.into());
            }
            let text = std::fs::read_to_string(path).context("reading GeoJSON file")?;
            let (dataset, geometries) = parse_feature_collection(&text, opts)?;
            Ok(LoadedDataset {
                dataset,
                geometries: Some(geometries),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one row per unit.
/// Every column from `start_column` on is an epoch; earlier columns
/// (ids, names, ...) are ignored. Empty cells are read as nodata.
pub fn load_csv(path: &Path, start_column: usize, delimiter: u8, nodata: f64) -> Result<Dataset> {
    let reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .from_path(path)
        .context("opening CSV")?;
    read_csv(reader, start_column, nodata)
}

fn read_csv<R: std::io::Read>(
    mut reader: csv::Reader<R>,
    start_column: usize,
    nodata: f64,
) -> Result<Dataset> {
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if start_column >= headers.len() {
        return Err(Error::invalid(
            "startcolumn",
            start_column,
            format!("CSV has only {} columns", headers.len()),
        )
        .into());
    }

    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); headers.len() - start_column];

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        for (offset, column) in columns.iter_mut().enumerate() {
            let col_idx = start_column + offset;
            let cell = record.get(col_idx).unwrap_or("").trim();
            let value = if cell.is_empty() {
                nodata
            } else {
                cell.parse::<f64>().with_context(|| {
                    format!("Row {row_no}, column '{}': '{cell}' is not a number", headers[col_idx])
                })?
            };
            column.push(value);
        }
    }

    let epochs = headers
        .into_iter()
        .skip(start_column)
        .zip(columns)
        .map(|(label, values)| Epoch::new(label, values))
        .collect();

    Ok(Dataset::new(epochs, nodata)?)
}

// ---------------------------------------------------------------------------
// GeoJSON loader
// ---------------------------------------------------------------------------

/// Expected input: a standard FeatureCollection.
///
/// ```json
/// { "type": "FeatureCollection",
///   "features": [
///     { "geometry": {...},
///       "properties": { "pop_2010": 120, "pop_2020": 135, "series": [120, 135] } } ] }
/// ```
///
/// Epoch labels come from `keys`, else from the `keys_key` list of the first
/// feature, else from the indices of the first feature's `values_key` list.
/// Values come from the `values_key` list when given, otherwise from a
/// property lookup per label with nodata as fallback.
pub fn parse_feature_collection(
    text: &str,
    opts: &LoadOptions,
) -> Result<(Dataset, Vec<JsonValue>)> {
    let root: JsonValue = serde_json::from_str(text).context("parsing GeoJSON")?;
    let features = root
        .get("features")
        .and_then(|f| f.as_array())
        .context("Expected a FeatureCollection with a 'features' array")?;

    let labels = epoch_labels(features, opts)?;
    let mut columns: Vec<Vec<f64>> = vec![Vec::with_capacity(features.len()); labels.len()];
    let mut geometries = Vec::with_capacity(features.len());

    for (i, feature) in features.iter().enumerate() {
        let props = properties(feature, i)?;

        match &opts.values_key {
            Some(vkey) => {
                let list = props
                    .get(vkey)
                    .and_then(|v| v.as_array())
                    .with_context(|| format!("Feature {i}: missing or invalid '{vkey}' list"))?;
                for (idx, column) in columns.iter_mut().enumerate() {
                    let value = list.get(idx).with_context(|| {
                        format!("Feature {i}: '{vkey}' has {} values, expected {}", list.len(), labels.len())
                    })?;
                    column.push(
                        json_to_f64(Some(value), opts.nodata)
                            .with_context(|| format!("Feature {i}, {vkey}[{idx}]: not a number"))?,
                    );
                }
            }
            None => {
                for (label, column) in labels.iter().zip(columns.iter_mut()) {
                    column.push(
                        json_to_f64(props.get(label), opts.nodata)
                            .with_context(|| format!("Feature {i}, '{label}': not a number"))?,
                    );
                }
            }
        }

        geometries.push(feature.get("geometry").cloned().unwrap_or(JsonValue::Null));
    }

    let epochs = labels
        .into_iter()
        .zip(columns)
        .map(|(label, values)| Epoch::new(label, values))
        .collect();

    Ok((Dataset::new(epochs, opts.nodata)?, geometries))
}

fn epoch_labels(features: &[JsonValue], opts: &LoadOptions) -> Result<Vec<String>> {
    if let Some(keys) = &opts.keys {
        return Ok(keys.clone());
    }

    let first = features.first().ok_or(Error::EmptyDataset)?;
    let props = properties(first, 0)?;

    if let Some(kkey) = &opts.keys_key {
        let names = props
            .get(kkey)
            .and_then(|v| v.as_array())
            .with_context(|| format!("Feature 0: missing or invalid '{kkey}' list"))?;
        return Ok(names
            .iter()
            .map(|n| match n {
                JsonValue::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect());
    }

    match &opts.values_key {
        Some(vkey) => {
            let list = props
                .get(vkey)
                .and_then(|v| v.as_array())
                .with_context(|| format!("Feature 0: missing or invalid '{vkey}' list"))?;
            Ok((0..list.len()).map(|i| i.to_string()).collect())
        }
        None => bail!(Error::MissingParameter { name: "keys or vkey" }),
    }
}

fn properties(feature: &JsonValue, i: usize) -> Result<&Map<String, JsonValue>> {
    feature
        .get("properties")
        .and_then(|p| p.as_object())
        .with_context(|| format!("Feature {i} has no 'properties' object"))
}

/// Missing and `null` read as nodata; numeric strings are accepted.
fn json_to_f64(val: Option<&JsonValue>, nodata: f64) -> Result<f64> {
    match val {
        None | Some(JsonValue::Null) => Ok(nodata),
        Some(JsonValue::Number(n)) => n.as_f64().context("number out of range"),
        Some(JsonValue::String(s)) => s
            .trim()
            .parse::<f64>()
            .with_context(|| format!("'{s}' is not a number")),
        Some(other) => bail!("unexpected value {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv_reader(text: &str) -> csv::Reader<&[u8]> {
        csv::ReaderBuilder::new()
            .delimiter(b';')
            .from_reader(text.as_bytes())
    }

    #[test]
    fn csv_columns_from_start_column_become_epochs() {
        let text = "id;name;2000;2010;2020\n1;a;10;12;\n2;b;5.5;-9999;7\n";
        let ds = read_csv(csv_reader(text), 2, -9999.0).unwrap();

        let labels: Vec<&str> = ds.epochs().iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["2000", "2010", "2020"]);
        assert_eq!(ds.num_units(), 2);
        assert_eq!(ds.epochs()[0].values, vec![10.0, 5.5]);
        // Empty cell falls back to nodata
        assert_eq!(ds.epochs()[2].values, vec![-9999.0, 7.0]);
    }

    #[test]
    fn csv_rejects_non_numeric_cell() {
        let text = "id;2000;2010\n1;3;abc\n";
        let err = read_csv(csv_reader(text), 1, -9999.0).unwrap_err();
        assert!(format!("{err:#}").contains("'abc' is not a number"));
    }

    #[test]
    fn csv_start_column_out_of_range() {
        let err = read_csv(csv_reader("a;b\n1;2\n"), 5, -9999.0).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::InvalidParameter { name: "startcolumn", .. })
        ));
    }

    #[test]
    fn missing_startcolumn_fails_before_opening() {
        let err = load_file(Path::new("does-not-exist.csv"), &LoadOptions::default()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<Error>(),
            Some(&Error::MissingParameter { name: "startcolumn" })
        );
    }

    #[test]
    fn missing_key_selection_fails_before_opening() {
        let err =
            load_file(Path::new("does-not-exist.geojson"), &LoadOptions::default()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<Error>(),
            Some(&Error::MissingParameter { name: "keys or vkey" })
        );
    }

    #[test]
    fn unsupported_extension() {
        let err = load_file(Path::new("data.xlsx"), &LoadOptions::default()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<Error>(),
            Some(&Error::UnsupportedFormat {
                extension: "xlsx".into()
            })
        );
        assert_eq!(
            InputKind::from_path(Path::new("x.GeoJSON")).unwrap(),
            InputKind::FeatureCollection
        );
    }

    const COLLECTION: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            { "type": "Feature",
              "geometry": { "type": "Point", "coordinates": [9.99, 53.55] },
              "properties": { "a": 1, "b": "2.5", "series": [1, 2, 3], "names": ["x", "y"], "x": 4 } },
            { "type": "Feature",
              "geometry": { "type": "Point", "coordinates": [10.0, 53.6] },
              "properties": { "a": null, "series": [4, null, 6], "y": 8 } }
        ]
    }"#;

    #[test]
    fn geojson_explicit_keys_with_nodata_fallback() {
        let opts = LoadOptions {
            keys: Some(vec!["a".into(), "b".into()]),
            ..LoadOptions::default()
        };
        let (ds, geometries) = parse_feature_collection(COLLECTION, &opts).unwrap();
        assert_eq!(ds.epochs()[0].values, vec![1.0, -9999.0]);
        assert_eq!(ds.epochs()[1].values, vec![2.5, -9999.0]);
        assert_eq!(geometries.len(), 2);
        assert_eq!(geometries[0]["type"], "Point");
    }

    #[test]
    fn geojson_list_valued_property() {
        let opts = LoadOptions {
            values_key: Some("series".into()),
            ..LoadOptions::default()
        };
        let (ds, _) = parse_feature_collection(COLLECTION, &opts).unwrap();
        let labels: Vec<&str> = ds.epochs().iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["0", "1", "2"]);
        assert_eq!(ds.epochs()[1].values, vec![2.0, -9999.0]);
    }

    #[test]
    fn geojson_labels_from_keys_key() {
        let opts = LoadOptions {
            keys_key: Some("names".into()),
            ..LoadOptions::default()
        };
        let (ds, _) = parse_feature_collection(COLLECTION, &opts).unwrap();
        assert_eq!(ds.epochs()[0].label, "x");
        assert_eq!(ds.epochs()[0].values, vec![4.0, -9999.0]);
        assert_eq!(ds.epochs()[1].values, vec![-9999.0, 8.0]);
    }

    #[test]
    fn geojson_short_value_list_is_an_error() {
        let text = r#"{ "features": [
            { "properties": { "v": [1, 2] } },
            { "properties": { "v": [1] } } ] }"#;
        let opts = LoadOptions {
            values_key: Some("v".into()),
            ..LoadOptions::default()
        };
        assert!(parse_feature_collection(text, &opts).is_err());
    }
}
