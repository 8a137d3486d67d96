//! Aspect Ratios - Named Targets and Crop Anchors
//!
//! Each ratio carries its own anchor policy, so adding a ratio never touches
//! the compositor's control flow.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::compositor::CompositorError;

/// Fraction of the removable vertical margin kept above a vertical crop.
/// Empirical: favors subjects framed in the upper two-thirds of product shots.
pub const VERTICAL_UPPER_BIAS: f64 = 0.3;

/// Where the crop window sits inside the removable margin on each axis.
///
/// `0.0` hugs the left/top edge, `1.0` the right/bottom edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropAnchor {
    #[serde(default = "half")]
    pub horizontal: f64,
    #[serde(default = "half")]
    pub vertical: f64,
}

fn half() -> f64 { 0.5 }

impl CropAnchor {
    pub const CENTER: CropAnchor = CropAnchor { horizontal: 0.5, vertical: 0.5 };

    pub fn upper_biased(vertical: f64) -> Self {
        Self { horizontal: 0.5, vertical }
    }

    fn offset(fraction: f64, margin: u32) -> u32 {
        let fraction = fraction.clamp(0.0, 1.0);
        ((margin as f64 * fraction).floor() as u32).min(margin)
    }
}

impl Default for CropAnchor {
    fn default() -> Self {
        Self::CENTER
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AspectRatio {
    pub id: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub anchor: CropAnchor,
}

impl AspectRatio {
    pub fn new(id: impl Into<String>, width: u32, height: u32, anchor: CropAnchor) -> Self {
        Self { id: id.into(), width, height, anchor }
    }

    /// Parse a `"W:H"` identifier into a centered ratio.
    pub fn parse(id: &str) -> Result<Self, CompositorError> {
        let invalid = || CompositorError::InvalidRatio(id.to_string());
        let (w, h) = id.split_once(':').ok_or_else(invalid)?;
        let width: u32 = w.trim().parse().map_err(|_| invalid())?;
        let height: u32 = h.trim().parse().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(Self::new(id, width, height, CropAnchor::CENTER))
    }

    /// Width divided by height.
    pub fn value(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

/// A crop rectangle in source pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropWindow {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Largest window of the target ratio that fits the source, placed by the
/// ratio's anchor.
pub fn crop_window(src_width: u32, src_height: u32, ratio: &AspectRatio) -> CropWindow {
    let target = ratio.value();
    let current = src_width as f64 / src_height as f64;

    let (width, height) = if current > target {
        // Source is wider: keep full height
        ((src_height as f64 * target) as u32, src_height)
    } else {
        (src_width, (src_width as f64 / target) as u32)
    };
    let width = width.clamp(1, src_width);
    let height = height.clamp(1, src_height);

    CropWindow {
        x: CropAnchor::offset(ratio.anchor.horizontal, src_width - width),
        y: CropAnchor::offset(ratio.anchor.vertical, src_height - height),
        width,
        height,
    }
}

/// Ratio registry - the set of ratios a request may name
#[derive(Debug, Clone)]
pub struct RatioRegistry {
    ratios: HashMap<String, AspectRatio>,
    order: Vec<String>,
}

impl RatioRegistry {
    /// An empty registry. Most callers want `RatioRegistry::default()`.
    pub fn new() -> Self {
        Self { ratios: HashMap::new(), order: Vec::new() }
    }

    pub fn get(&self, id: &str) -> Option<&AspectRatio> {
        self.ratios.get(id)
    }

    /// Ratios in registration order.
    pub fn list(&self) -> Vec<&AspectRatio> {
        self.order.iter().filter_map(|id| self.ratios.get(id)).collect()
    }

    pub fn ids(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Add a ratio, replacing any existing entry with the same id.
    pub fn register(&mut self, ratio: AspectRatio) -> Result<(), CompositorError> {
        if ratio.width == 0 || ratio.height == 0 {
            return Err(CompositorError::InvalidRatio(ratio.id));
        }
        if !self.ratios.contains_key(&ratio.id) {
            self.order.push(ratio.id.clone());
        }
        self.ratios.insert(ratio.id.clone(), ratio);
        Ok(())
    }

    fn insert_builtin(&mut self, ratio: AspectRatio) {
        self.order.push(ratio.id.clone());
        self.ratios.insert(ratio.id.clone(), ratio);
    }
}

impl Default for RatioRegistry {
    fn default() -> Self {
        let mut registry = Self::new();
        registry.insert_builtin(AspectRatio::new("1:1", 1, 1, CropAnchor::CENTER));
        registry.insert_builtin(AspectRatio::new(
            "9:16",
            9,
            16,
            CropAnchor::upper_biased(VERTICAL_UPPER_BIAS),
        ));
        registry.insert_builtin(AspectRatio::new("16:9", 16, 9, CropAnchor::CENTER));
        registry
    }
}
