//! Run configuration, loaded from JSON.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aspect::{AspectRatio, RatioRegistry};
use crate::compliance::{BrandConfig, ComplianceChecker, LegalConfig};
use crate::overlay::TextOverlayConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {0}: {1}")]
    Io(String, std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComplianceConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub brand: BrandConfig,
    #[serde(default)]
    pub legal: LegalConfig,
}

impl ComplianceConfig {
    pub fn checker(&self) -> Option<ComplianceChecker> {
        self.enabled
            .then(|| ComplianceChecker::new(self.brand.clone(), self.legal.clone()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Ratios produced when a request names none. Empty means all registered.
    #[serde(default)]
    pub aspect_ratios: Vec<String>,
    /// Ratios added to the built-in set.
    #[serde(default)]
    pub custom_ratios: Vec<AspectRatio>,
    #[serde(default)]
    pub text_overlay: TextOverlayConfig,
    #[serde(default = "default_true")]
    pub adaptive_contrast: bool,
    #[serde(default)]
    pub compliance: ComplianceConfig,
}

fn default_true() -> bool { true }

/// Panel padding cap, in pixels.
pub const MAX_PADDING: u32 = 10_000;

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            aspect_ratios: Vec::new(),
            custom_ratios: Vec::new(),
            text_overlay: TextOverlayConfig::default(),
            adaptive_contrast: true,
            compliance: ComplianceConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.display().to_string(), e))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let overlay = &self.text_overlay;
        if !(0.0..=1.0).contains(&overlay.background_opacity) {
            return Err(ConfigError::Invalid(format!(
                "background_opacity must be within [0, 1], got {}",
                overlay.background_opacity
            )));
        }
        if overlay.font_size == 0 {
            return Err(ConfigError::Invalid("font_size must be positive".into()));
        }
        if overlay.padding > MAX_PADDING {
            return Err(ConfigError::Invalid(format!(
                "padding must be at most {} px, got {}",
                MAX_PADDING, overlay.padding
            )));
        }
        let brand = &self.compliance.brand;
        if !(0.0..=1.0).contains(&brand.min_logo_confidence) {
            return Err(ConfigError::Invalid(format!(
                "min_logo_confidence must be within [0, 1], got {}",
                brand.min_logo_confidence
            )));
        }
        if brand.color_tolerance < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "color_tolerance must not be negative, got {}",
                brand.color_tolerance
            )));
        }
        Ok(())
    }

    /// Built-in ratios plus `custom_ratios`.
    pub fn registry(&self) -> Result<RatioRegistry, ConfigError> {
        let mut registry = RatioRegistry::default();
        for ratio in &self.custom_ratios {
            registry
                .register(ratio.clone())
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }
        Ok(registry)
    }
}
