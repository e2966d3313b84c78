use std::collections::BTreeMap;

use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

use crate::smooth::Smoother;

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.7, 0.5);
            let rgb: Srgb = hsl.into_color();
            Color32::from_rgb(
                (rgb.red * 255.0).round() as u8,
                (rgb.green * 255.0).round() as u8,
                (rgb.blue * 255.0).round() as u8,
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Fixed series colours
// ---------------------------------------------------------------------------

pub const GOOD_POINT: Color32 = Color32::from_rgb(40, 40, 40);
pub const BAD_POINT: Color32 = Color32::from_rgb(170, 170, 170);
pub const OUTLIER_POINT: Color32 = Color32::from_rgb(220, 50, 47);

pub fn smoother_color(smoother: Smoother) -> Color32 {
    match smoother {
        Smoother::SavitzkyGolay => Color32::from_rgb(38, 139, 210),
        Smoother::Spline => Color32::from_rgb(133, 153, 0),
        Smoother::Loess => Color32::from_rgb(203, 75, 22),
        Smoother::Linear => Color32::from_rgb(108, 113, 196),
    }
}

// ---------------------------------------------------------------------------
// Color mapping: key → Color32
// ---------------------------------------------------------------------------

/// Maps an ordered set of keys (years in the day-of-year overlay) to
/// distinct colours.
#[derive(Debug, Clone)]
pub struct ColorMap<K: Ord> {
    mapping: BTreeMap<K, Color32>,
    default_color: Color32,
}

impl<K: Ord> ColorMap<K> {
    pub fn new<I: IntoIterator<Item = K>>(keys: I) -> Self {
        let keys: Vec<K> = keys.into_iter().collect();
        let palette = generate_palette(keys.len());
        ColorMap {
            mapping: keys.into_iter().zip(palette).collect(),
            default_color: Color32::GRAY,
        }
    }

    pub fn color_for(&self, key: &K) -> Color32 {
        self.mapping.get(key).copied().unwrap_or(self.default_color)
    }
}
