//! Aspect-Ratio Compositor
//!
//! Crops one source image into per-ratio variants. Crops only; resizing is
//! left to the caller.

use image::{DynamicImage, GenericImageView};
use thiserror::Error;

use crate::aspect::{crop_window, AspectRatio, RatioRegistry};

#[derive(Debug, Error)]
pub enum CompositorError {
    #[error("Unsupported aspect ratio: {0}")]
    UnsupportedAspectRatio(String),

    #[error("Invalid aspect ratio definition: {0}")]
    InvalidRatio(String),

    #[error("Source image has zero area ({0}x{1})")]
    EmptyImage(u32, u32),
}

/// One cropped variant.
#[derive(Debug, Clone)]
pub struct Variant {
    pub ratio: String,
    pub image: DynamicImage,
}

/// Variants in request order.
#[derive(Debug, Clone, Default)]
pub struct Variants {
    items: Vec<Variant>,
}

impl Variants {
    pub fn get(&self, ratio: &str) -> Option<&DynamicImage> {
        self.items.iter().find(|v| v.ratio == ratio).map(|v| &v.image)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn ratios(&self) -> Vec<&str> {
        self.items.iter().map(|v| v.ratio.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variant> {
        self.items.iter()
    }
}

impl IntoIterator for Variants {
    type Item = Variant;
    type IntoIter = std::vec::IntoIter<Variant>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

pub struct Compositor {
    registry: RatioRegistry,
}

impl Compositor {
    pub fn new(registry: RatioRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &RatioRegistry {
        &self.registry
    }

    /// Crop `image` into every requested ratio (all registered ratios when
    /// `ratios` is `None`).
    ///
    /// Every name is resolved before any pixel work, so an unsupported name
    /// fails the whole call.
    pub fn create_variants(
        &self,
        image: &DynamicImage,
        ratios: Option<&[String]>,
    ) -> Result<Variants, CompositorError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(CompositorError::EmptyImage(width, height));
        }

        let requested: Vec<&AspectRatio> = match ratios {
            None => self.registry.list(),
            Some(ids) => {
                let mut resolved: Vec<&AspectRatio> = Vec::with_capacity(ids.len());
                for id in ids {
                    let ratio = self.registry.get(id)
                        .ok_or_else(|| CompositorError::UnsupportedAspectRatio(id.clone()))?;
                    if !resolved.iter().any(|r| r.id == ratio.id) {
                        resolved.push(ratio);
                    }
                }
                resolved
            }
        };

        let items = requested
            .into_iter()
            .map(|ratio| {
                let window = crop_window(width, height, ratio);
                Variant {
                    ratio: ratio.id.clone(),
                    image: image.crop_imm(window.x, window.y, window.width, window.height),
                }
            })
            .collect();

        Ok(Variants { items })
    }
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new(RatioRegistry::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn solid(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([0, 0, 255])))
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_default_creates_all_ratios() {
        let variants = Compositor::default().create_variants(&solid(1000, 1000), None).unwrap();
        assert_eq!(variants.ratios(), vec!["1:1", "9:16", "16:9"]);
    }

    #[test]
    fn test_specific_ratios_only() {
        let variants = Compositor::default()
            .create_variants(&solid(1000, 1000), Some(&ids(&["1:1", "16:9"])))
            .unwrap();
        assert_eq!(variants.len(), 2);
        assert!(variants.get("9:16").is_none());
    }

    #[test]
    fn test_unsupported_ratio_fails_whole_call() {
        let err = Compositor::default()
            .create_variants(&solid(100, 100), Some(&ids(&["1:1", "4:3"])))
            .unwrap_err();
        assert!(err.to_string().contains("4:3"));
    }

    #[test]
    fn test_duplicate_ratio_yields_one_variant() {
        let variants = Compositor::default()
            .create_variants(&solid(300, 300), Some(&ids(&["1:1", "1:1"])))
            .unwrap();
        assert_eq!(variants.len(), 1);
    }

    #[test]
    fn test_zero_area_rejected() {
        let empty = DynamicImage::ImageRgb8(RgbImage::new(0, 10));
        assert!(matches!(
            Compositor::default().create_variants(&empty, None),
            Err(CompositorError::EmptyImage(0, 10))
        ));
    }

    #[test]
    fn test_ratios_hold_for_various_sizes() {
        let compositor = Compositor::default();
        for (w, h) in [(800, 600), (1920, 1080), (1080, 1920), (500, 500)] {
            let variants = compositor.create_variants(&solid(w, h), None).unwrap();
            for variant in variants.iter() {
                let expected = compositor.registry().get(&variant.ratio).unwrap().value();
                let (vw, vh) = variant.image.dimensions();
                let actual = vw as f64 / vh as f64;
                assert!((actual - expected).abs() / expected < 0.01, "{} at {}x{}", variant.ratio, w, h);
                assert!(vw <= w && vh <= h);
            }
        }
    }

    #[test]
    fn test_color_mode_preserved() {
        let gray = DynamicImage::ImageLuma8(image::GrayImage::new(64, 32));
        let variants = Compositor::default().create_variants(&gray, None).unwrap();
        assert!(variants.iter().all(|v| v.image.color() == image::ColorType::L8));
    }
}
