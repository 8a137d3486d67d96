//! Brand compliance - logo presence and brand palette presence.
//!
//! Each sub-check is a rule; an unconfigured rule is skipped and never fails
//! the result.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use image::{DynamicImage, GenericImageView, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::logo::match_template;
use super::palette::{dominant_colors, DOMINANT_COLORS};
use super::{ComplianceError, ComplianceResult};
use crate::color::{distance, parse_hex};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandConfig {
    /// Reference logo file, loaded on first use.
    #[serde(default, alias = "logo_template_path")]
    pub logo_template: Option<PathBuf>,
    #[serde(default)]
    pub brand_colors: Vec<String>,
    #[serde(default = "default_min_logo_confidence")]
    pub min_logo_confidence: f64,
    #[serde(default = "default_color_tolerance")]
    pub color_tolerance: f64,
    #[serde(skip)]
    logo_cache: OnceLock<Option<RgbImage>>,
}

fn default_min_logo_confidence() -> f64 { 0.7 }
fn default_color_tolerance() -> f64 { 30.0 }

impl Default for BrandConfig {
    fn default() -> Self {
        Self {
            logo_template: None,
            brand_colors: Vec::new(),
            min_logo_confidence: default_min_logo_confidence(),
            color_tolerance: default_color_tolerance(),
            logo_cache: OnceLock::new(),
        }
    }
}

impl BrandConfig {
    pub fn with_logo_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.logo_template = Some(path.into());
        self.logo_cache = OnceLock::new();
        self
    }

    /// Use an already decoded logo instead of a file.
    pub fn with_logo_image(mut self, logo: &DynamicImage) -> Self {
        self.logo_cache = OnceLock::from(Some(logo.to_rgb8()));
        self
    }

    pub fn with_colors<I, S>(mut self, colors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.brand_colors = colors.into_iter().map(Into::into).collect();
        self
    }

    /// Whether a logo reference was configured at all (readable or not).
    pub fn logo_configured(&self) -> bool {
        self.logo_template.is_some() || matches!(self.logo_cache.get(), Some(Some(_)))
    }

    /// The reference logo, loaded once. An unreadable file counts as absent.
    pub fn logo_reference(&self) -> Option<&RgbImage> {
        self.logo_cache
            .get_or_init(|| self.logo_template.as_deref().and_then(load_logo))
            .as_ref()
    }
}

fn load_logo(path: &Path) -> Option<RgbImage> {
    match image::open(path) {
        Ok(img) => Some(img.to_rgb8()),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "logo reference unreadable, skipping logo check");
            None
        }
    }
}

/// What one rule concluded.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleOutcome {
    /// Not configured; an optional note for the details line.
    Skipped(Option<String>),
    Passed(String),
    Failed { detail: String, violation: String },
}

pub trait BrandRule {
    fn name(&self) -> &'static str;
    fn evaluate(&self, image: &DynamicImage, config: &BrandConfig) -> Result<RuleOutcome, ComplianceError>;
}

pub struct LogoRule;

impl BrandRule for LogoRule {
    fn name(&self) -> &'static str { "logo" }

    fn evaluate(&self, image: &DynamicImage, config: &BrandConfig) -> Result<RuleOutcome, ComplianceError> {
        if !config.logo_configured() {
            return Ok(RuleOutcome::Skipped(None));
        }
        let Some(reference) = config.logo_reference() else {
            return Ok(RuleOutcome::Skipped(Some(
                "Logo reference unavailable; logo check skipped".to_string(),
            )));
        };

        let score = match_template(&image.to_rgb8(), reference);
        if score >= config.min_logo_confidence {
            Ok(RuleOutcome::Passed(format!("Logo detected in image (confidence {:.2})", score)))
        } else {
            Ok(RuleOutcome::Failed {
                detail: "Logo detection failed".to_string(),
                violation: format!(
                    "Brand logo not detected in image (best match {:.2}, required {:.2})",
                    score, config.min_logo_confidence
                ),
            })
        }
    }
}

pub struct ColorRule;

impl BrandRule for ColorRule {
    fn name(&self) -> &'static str { "brand_colors" }

    fn evaluate(&self, image: &DynamicImage, config: &BrandConfig) -> Result<RuleOutcome, ComplianceError> {
        if config.brand_colors.is_empty() {
            return Ok(RuleOutcome::Skipped(None));
        }
        let expected = config
            .brand_colors
            .iter()
            .map(|c| parse_hex(c))
            .collect::<Result<Vec<_>, _>>()?;

        let dominant = dominant_colors(image, DOMINANT_COLORS)
            .iter()
            .map(|c| parse_hex(c))
            .collect::<Result<Vec<_>, _>>()?;

        let found = dominant
            .iter()
            .any(|d| expected.iter().any(|e| distance(*d, *e) <= config.color_tolerance));

        let listed = config.brand_colors.join(", ");
        if found {
            Ok(RuleOutcome::Passed(format!("Brand colors detected: {}", listed)))
        } else {
            Ok(RuleOutcome::Failed {
                detail: "Brand color validation failed".to_string(),
                violation: format!("Brand colors not found. Expected: {}", listed),
            })
        }
    }
}

/// Run every brand rule against `image`.
pub fn check_brand(config: &BrandConfig, image: &DynamicImage) -> Result<ComplianceResult, ComplianceError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(ComplianceError::EmptyImage(width, height));
    }

    let rules: [&dyn BrandRule; 2] = [&LogoRule, &ColorRule];
    let mut details = Vec::new();
    let mut violations = Vec::new();

    for rule in rules {
        match rule.evaluate(image, config)? {
            RuleOutcome::Skipped(note) => details.extend(note),
            RuleOutcome::Passed(detail) => details.push(detail),
            RuleOutcome::Failed { detail, violation } => {
                details.push(detail);
                violations.push(violation);
            }
        }
    }

    let details = if details.is_empty() {
        "No brand compliance checks configured".to_string()
    } else {
        details.join("; ")
    };
    Ok(ComplianceResult::from_violations(details, violations))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{imageops, Rgb};

    fn red(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([255, 0, 0])))
    }

    fn checker_logo() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(20, 20, |x, y| {
            if (x / 5 + y / 5) % 2 == 0 { Rgb([0, 0, 255]) } else { Rgb([255, 255, 255]) }
        }))
    }

    #[test]
    fn test_nothing_configured_passes() {
        let result = check_brand(&BrandConfig::default(), &red(100, 100)).unwrap();
        assert!(result.passed);
        assert!(result.violations.is_empty());
        assert!(result.details.contains("No brand compliance checks configured"));
    }

    #[test]
    fn test_brand_color_present() {
        let config = BrandConfig::default().with_colors(["#FF0000"]);
        let result = check_brand(&config, &red(100, 100)).unwrap();
        assert!(result.passed);
        assert!(result.details.contains("Brand colors detected"));
    }

    #[test]
    fn test_brand_color_absent() {
        let config = BrandConfig::default().with_colors(["#00FF00"]);
        let result = check_brand(&config, &red(100, 100)).unwrap();
        assert!(!result.passed);
        assert_eq!(result.violations.len(), 1);
        assert!(result.violations[0].contains("#00FF00"));
    }

    #[test]
    fn test_malformed_brand_color_is_an_error() {
        let config = BrandConfig::default().with_colors(["#ZZZZZZ"]);
        let err = check_brand(&config, &red(10, 10)).unwrap_err();
        assert!(err.to_string().contains("#ZZZZZZ"));
    }

    #[test]
    fn test_logo_detected() {
        let logo = checker_logo();
        let mut img = RgbImage::from_pixel(100, 100, Rgb([255, 0, 0]));
        imageops::overlay(&mut img, &logo.to_rgb8(), 10, 10);
        let config = BrandConfig::default().with_logo_image(&logo);
        let result = check_brand(&config, &DynamicImage::ImageRgb8(img)).unwrap();
        assert!(result.passed, "{:?}", result);
        assert!(result.details.contains("Logo detected"));
    }

    #[test]
    fn test_logo_absent() {
        let config = BrandConfig::default().with_logo_image(&checker_logo());
        let result = check_brand(&config, &red(100, 100)).unwrap();
        assert!(!result.passed);
        assert!(result.details.contains("Logo detection failed"));
        assert!(result.violations[0].to_lowercase().contains("logo not detected"));
    }

    #[test]
    fn test_missing_logo_file_skips_check() {
        let config = BrandConfig::default().with_logo_path("/no/such/logo.png");
        let result = check_brand(&config, &red(50, 50)).unwrap();
        assert!(result.passed);
        assert!(result.details.contains("skipped"));
        assert!(config.logo_reference().is_none());
    }

    #[test]
    fn test_logo_loaded_once_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logo.png");
        checker_logo().save(&path).unwrap();

        let config = BrandConfig::default().with_logo_path(&path);
        let first = config.logo_reference().map(|l| l as *const RgbImage);
        std::fs::remove_file(&path).unwrap();
        let second = config.logo_reference().map(|l| l as *const RgbImage);
        assert!(first.is_some());
        assert_eq!(first, second);
    }
}
