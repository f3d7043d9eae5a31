use anyhow::{Context, Result};
use serde_json::json;

const NODATA: f64 = -9999.0;
const EPOCHS: [&str; 5] = ["2000", "2005", "2010", "2015", "2020"];

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// One unit's series: a noisy plateau, with a genuine shift for some units.
fn generate_series(rng: &mut SimpleRng) -> Vec<f64> {
    let mut level = rng.next_f64() * 80.0 + 10.0;
    let shift_at = if rng.next_f64() < 0.3 {
        Some(1 + (rng.next_u64() % (EPOCHS.len() as u64 - 1)) as usize)
    } else {
        None
    };
    (0..EPOCHS.len())
        .map(|epoch| {
            if Some(epoch) == shift_at {
                level += rng.gauss(0.0, 30.0);
            }
            if rng.next_f64() < 0.02 {
                return NODATA;
            }
            (level + rng.gauss(0.0, 1.5)).clamp(0.0, 120.0).round()
        })
        .collect()
}

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);
    let units = 60;

    let rows: Vec<Vec<f64>> = (0..units).map(|_| generate_series(&mut rng)).collect();

    // CSV: id;name;<epochs...>
    let csv_path = "sample_data.csv";
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .from_path(csv_path)
        .context("creating CSV")?;
    let mut header = vec!["id".to_string(), "name".to_string()];
    header.extend(EPOCHS.iter().map(|e| e.to_string()));
    writer.write_record(&header)?;
    for (id, row) in rows.iter().enumerate() {
        let mut record = vec![id.to_string(), format!("district_{id:03}")];
        record.extend(row.iter().map(|v| v.to_string()));
        writer.write_record(&record)?;
    }
    writer.flush()?;

    // GeoJSON: one point per unit on a grid, series as a list property
    let geojson_path = "sample_data.geojson";
    let features: Vec<_> = rows
        .iter()
        .enumerate()
        .map(|(id, row)| {
            json!({
                "type": "Feature",
                "geometry": {
                    "type": "Point",
                    "coordinates": [9.9 + (id % 10) as f64 * 0.02, 53.5 + (id / 10) as f64 * 0.02],
                },
                "properties": {
                    "id": id,
                    "series": row,
                    "epochs": EPOCHS,
                },
            })
        })
        .collect();
    let collection = json!({ "type": "FeatureCollection", "features": features });
    std::fs::write(geojson_path, serde_json::to_string_pretty(&collection)?)
        .context("writing GeoJSON")?;

    println!(
        "Wrote {units} units x {} epochs to {csv_path} and {geojson_path}",
        EPOCHS.len()
    );
    Ok(())
}
