//! Compliance - Brand and Legal Checks
//!
//! A failed policy is a normal result with `passed == false`, never an error.
//! Errors are reserved for malformed input.

pub mod brand;
pub mod legal;
pub mod logo;
pub mod palette;

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::color::InvalidHexColor;

pub use brand::{check_brand, BrandConfig, BrandRule, ColorRule, LogoRule, RuleOutcome};
pub use legal::{check_legal, LegalConfig, LegalFinding, Severity};

#[derive(Debug, Error)]
pub enum ComplianceError {
    #[error(transparent)]
    InvalidHexColor(#[from] InvalidHexColor),

    #[error("Cannot check an image with zero area ({0}x{1})")]
    EmptyImage(u32, u32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceResult {
    pub passed: bool,
    pub details: String,
    #[serde(default)]
    pub violations: Vec<String>,
}

impl ComplianceResult {
    pub fn pass(details: impl Into<String>) -> Self {
        Self { passed: true, details: details.into(), violations: vec![] }
    }

    /// Passed exactly when `violations` is empty.
    pub fn from_violations(details: impl Into<String>, violations: Vec<String>) -> Self {
        Self { passed: violations.is_empty(), details: details.into(), violations }
    }

    /// Combine two results; both must pass for the merge to pass.
    pub fn merge(&self, other: &ComplianceResult) -> ComplianceResult {
        let details = [self.details.as_str(), other.details.as_str()]
            .into_iter()
            .filter(|d| !d.is_empty())
            .collect::<Vec<_>>()
            .join("; ");
        ComplianceResult {
            passed: self.passed && other.passed,
            details,
            violations: self.violations.iter().chain(&other.violations).cloned().collect(),
        }
    }
}

/// Brand and legal policy for one run.
#[derive(Debug, Clone, Default)]
pub struct ComplianceChecker {
    brand: BrandConfig,
    legal: LegalConfig,
}

impl ComplianceChecker {
    pub fn new(brand: BrandConfig, legal: LegalConfig) -> Self {
        Self { brand, legal }
    }

    pub fn brand_config(&self) -> &BrandConfig {
        &self.brand
    }

    pub fn legal_config(&self) -> &LegalConfig {
        &self.legal
    }

    pub fn check_brand(&self, image: &DynamicImage) -> Result<ComplianceResult, ComplianceError> {
        check_brand(&self.brand, image)
    }

    pub fn check_legal(&self, text: &str) -> ComplianceResult {
        check_legal(&self.legal, text)
    }
}
