//! Contrast adaptation - panel opacity from measured background brightness.

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use super::layout::Rect;

/// Brightness thresholds and opacity adjustments.
///
/// The defaults are empirical and open to tuning; nothing downstream relies
/// on their exact values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContrastPolicy {
    pub bright_threshold: f64,
    pub moderate_threshold: f64,
    pub dark_threshold: f64,
    pub bright_boost: f32,
    pub bright_cap: f32,
    pub moderate_boost: f32,
    pub moderate_cap: f32,
    pub dark_reduction: f32,
    pub dark_floor: f32,
}

impl Default for ContrastPolicy {
    fn default() -> Self {
        Self {
            bright_threshold: 180.0,
            moderate_threshold: 120.0,
            dark_threshold: 60.0,
            bright_boost: 0.30,
            bright_cap: 0.90,
            moderate_boost: 0.15,
            moderate_cap: 0.80,
            dark_reduction: 0.20,
            dark_floor: 0.30,
        }
    }
}

impl ContrastPolicy {
    /// Opacity for a panel over a background of mean luma `brightness`.
    pub fn adjust(&self, base_opacity: f32, brightness: f64) -> f32 {
        if brightness > self.bright_threshold {
            (base_opacity + self.bright_boost).min(self.bright_cap)
        } else if brightness > self.moderate_threshold {
            (base_opacity + self.moderate_boost).min(self.moderate_cap)
        } else if brightness < self.dark_threshold {
            (base_opacity - self.dark_reduction).max(self.dark_floor)
        } else {
            base_opacity
        }
    }
}

/// ITU-R 601 luma of one pixel.
fn luma(rgb: [u8; 3]) -> f64 {
    (rgb[0] as f64 * 299.0 + rgb[1] as f64 * 587.0 + rgb[2] as f64 * 114.0) / 1000.0
}

/// Mean luma of `region` (already clamped to the image), `None` if empty.
pub fn mean_brightness(image: &RgbaImage, region: Rect) -> Option<f64> {
    let mut total = 0.0;
    let mut count = 0u64;
    for y in region.top..region.bottom {
        for x in region.left..region.right {
            let p = image.get_pixel(x as u32, y as u32).0;
            total += luma([p[0], p[1], p[2]]);
            count += 1;
        }
    }
    (count > 0).then(|| total / count as f64)
}
