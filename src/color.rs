use palette::{Hsl, IntoColor, Srgb};

// ---------------------------------------------------------------------------
// Ordinal colour ramp
// ---------------------------------------------------------------------------

/// `n` colours of one hue from light to dark, as `#rrggbb`.
///
/// Classes are ordered, so a lightness sweep reads better on a map than
/// distinct hues.
pub fn class_ramp(n: usize) -> Vec<String> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let t = if n == 1 { 0.5 } else { i as f32 / (n - 1) as f32 };
            let hsl = Hsl::new(210.0, 0.65, 0.88 - 0.63 * t);
            let rgb: Srgb = hsl.into_color();
            format!(
                "#{:02x}{:02x}{:02x}",
                (rgb.red.clamp(0.0, 1.0) * 255.0).round() as u8,
                (rgb.green.clamp(0.0, 1.0) * 255.0).round() as u8,
                (rgb.blue.clamp(0.0, 1.0) * 255.0).round() as u8,
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Class index → colour
// ---------------------------------------------------------------------------

/// Maps class indices to ramp colours; nodata gets a neutral grey.
#[derive(Debug, Clone)]
pub struct ClassColorMap {
    mapping: Vec<String>,
    nodata_color: String,
}

impl ClassColorMap {
    pub fn new(num_classes: usize) -> Self {
        ClassColorMap {
            mapping: class_ramp(num_classes),
            nodata_color: "#bdbdbd".to_string(),
        }
    }

    /// Colour of a class, `None` meaning nodata.
    pub fn color_for(&self, class: Option<usize>) -> &str {
        class
            .and_then(|c| self.mapping.get(c))
            .unwrap_or(&self.nodata_color)
    }

    /// Legend entries (class index → colour).
    pub fn legend_entries(&self) -> Vec<(usize, &str)> {
        self.mapping
            .iter()
            .enumerate()
            .map(|(i, c)| (i, c.as_str()))
            .collect()
    }
}
