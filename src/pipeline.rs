//! Creative Pipeline - Single Entry Point
//!
//! crop -> overlay -> compliance -> hash, for one source image and one message.
//! Compliance failures are recorded on the creative; they do not abort the run.

use std::io::Cursor;

use base64::Engine;
use chrono::{DateTime, Utc};
use image::{DynamicImage, GenericImageView, ImageOutputFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::compliance::{ComplianceChecker, ComplianceError, ComplianceResult};
use crate::compositor::{Compositor, CompositorError};
use crate::config::{ConfigError, PipelineConfig};
use crate::hashing::{compute_job_hash, compute_manifest_hash, pixel_hash, sha256_hex};
use crate::overlay::{RenderError, TextOverlayRenderer, TextPosition};
use crate::ENGINE_VERSION;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Compositor(#[from] CompositorError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Compliance(#[from] ComplianceError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to encode {0} variant as PNG: {1}")]
    Encode(String, image::ImageError),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreativeRequest {
    pub message: String,
    /// Region-specific message; replaces `message` when present.
    #[serde(default)]
    pub localized_message: Option<String>,
    /// Ratios to produce; `None` uses the configured set.
    #[serde(default)]
    pub aspect_ratios: Option<Vec<String>>,
    #[serde(default)]
    pub position: Option<TextPosition>,
}

impl CreativeRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), ..Default::default() }
    }

    pub fn with_localized(mut self, message: impl Into<String>) -> Self {
        self.localized_message = Some(message.into());
        self
    }

    pub fn with_ratios<I, S>(mut self, ratios: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aspect_ratios = Some(ratios.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_position(mut self, position: TextPosition) -> Self {
        self.position = Some(position);
        self
    }

    /// The message that will be rendered and screened.
    pub fn effective_message(&self) -> &str {
        match self.localized_message.as_deref() {
            Some(localized) if !localized.trim().is_empty() => localized,
            _ => &self.message,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderedVariant {
    pub ratio: String,
    pub width: u32,
    pub height: u32,
    /// `pixel_hash` of the final image.
    pub hash: String,
    /// Brand result for this variant alone.
    pub brand: Option<ComplianceResult>,
    /// Brand merged with the creative's legal result.
    pub compliance: Option<ComplianceResult>,
    #[serde(skip)]
    pub image: DynamicImage,
}

impl RenderedVariant {
    pub fn passed(&self) -> bool {
        self.compliance.as_ref().map_or(true, |c| c.passed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompiledCreative {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub engine_version: String,
    pub source_hash: String,
    pub message: String,
    pub legal: Option<ComplianceResult>,
    pub variants: Vec<RenderedVariant>,
    pub job_hash: String,
    pub manifest_hash: String,
}

impl CompiledCreative {
    pub fn passed(&self) -> bool {
        self.legal.as_ref().map_or(true, |l| l.passed) && self.variants.iter().all(RenderedVariant::passed)
    }

    pub fn variant(&self, ratio: &str) -> Option<&RenderedVariant> {
        self.variants.iter().find(|v| v.ratio == ratio)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedFile {
    pub ratio: String,
    pub filename: String,
    pub width: u32,
    pub height: u32,
    /// SHA-256 of the encoded PNG bytes.
    pub hash: String,
    pub data_base64: String,
}

/// Encode a variant as PNG for inline transport.
pub fn export_png(variant: &RenderedVariant) -> Result<ExportedFile, PipelineError> {
    let mut bytes = Vec::new();
    variant
        .image
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
        .map_err(|e| PipelineError::Encode(variant.ratio.clone(), e))?;

    Ok(ExportedFile {
        ratio: variant.ratio.clone(),
        filename: format!("{}.png", variant.ratio.replace(':', "x")),
        width: variant.width,
        height: variant.height,
        hash: sha256_hex(&bytes),
        data_base64: base64::engine::general_purpose::STANDARD.encode(&bytes),
    })
}

/// The creative pipeline - one compositor, renderer and checker per run.
pub struct CreativePipeline {
    config: PipelineConfig,
    compositor: Compositor,
    renderer: TextOverlayRenderer,
    checker: Option<ComplianceChecker>,
}

impl CreativePipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        let renderer = TextOverlayRenderer::new(config.text_overlay.clone())?;
        Self::with_renderer(config, renderer)
    }

    /// Use a prepared renderer (for a specific font) instead of resolving one.
    pub fn with_renderer(config: PipelineConfig, renderer: TextOverlayRenderer) -> Result<Self, PipelineError> {
        config.validate()?;
        let compositor = Compositor::new(config.registry()?);
        let checker = config.compliance.checker();
        Ok(Self { config, compositor, renderer, checker })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn renderer(&self) -> &TextOverlayRenderer {
        &self.renderer
    }

    pub fn checker(&self) -> Option<&ComplianceChecker> {
        self.checker.as_ref()
    }

    fn ratios_for<'a>(&'a self, request: &'a CreativeRequest) -> Option<&'a [String]> {
        match &request.aspect_ratios {
            Some(ids) => Some(ids.as_slice()),
            None if !self.config.aspect_ratios.is_empty() => Some(self.config.aspect_ratios.as_slice()),
            None => None,
        }
    }

    /// Compile one creative. The source image is never modified.
    pub fn compile(&self, image: &DynamicImage, request: &CreativeRequest) -> Result<CompiledCreative, PipelineError> {
        let (width, height) = image.dimensions();
        let message = request.effective_message().to_string();
        let source_hash = pixel_hash(image);
        info!(width, height, source = %&source_hash[..12], "compiling creative");

        let variants = self.compositor.create_variants(image, self.ratios_for(request))?;

        let legal = self.checker.as_ref().map(|c| c.check_legal(&message));
        if let Some(legal) = legal.as_ref().filter(|l| !l.passed) {
            warn!(violations = legal.violations.len(), "message failed legal check");
        }

        let mut rendered = Vec::with_capacity(variants.len());
        for variant in variants {
            let image = if self.config.adaptive_contrast {
                self.renderer.render_overlay_adaptive(&variant.image, &message, request.position)?
            } else {
                self.renderer.render_overlay(&variant.image, &message, request.position)?
            };

            let brand = match &self.checker {
                Some(checker) => Some(checker.check_brand(&image)?),
                None => None,
            };
            let compliance = match (&brand, &legal) {
                (Some(b), Some(l)) => Some(b.merge(l)),
                _ => None,
            };
            if let Some(c) = compliance.as_ref().filter(|c| !c.passed) {
                warn!(ratio = %variant.ratio, violations = c.violations.len(), "variant failed compliance");
            }

            let (w, h) = image.dimensions();
            let hash = pixel_hash(&image);
            debug!(ratio = %variant.ratio, width = w, height = h, hash = %&hash[..12], "rendered variant");
            rendered.push(RenderedVariant {
                ratio: variant.ratio,
                width: w,
                height: h,
                hash,
                brand,
                compliance,
                image,
            });
        }

        let job_hash = compute_job_hash(&source_hash, request, ENGINE_VERSION)?;
        let mut creative = CompiledCreative {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            engine_version: ENGINE_VERSION.to_string(),
            source_hash,
            message,
            legal,
            variants: rendered,
            job_hash,
            manifest_hash: String::new(),
        };
        creative.manifest_hash = compute_manifest_hash(&creative)?;

        info!(
            id = %creative.id,
            variants = creative.variants.len(),
            passed = creative.passed(),
            "creative compiled"
        );
        Ok(creative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliance::Severity;
    use crate::overlay::Font;
    use image::{Rgb, RgbImage};
    use std::collections::HashMap;

    fn pipeline(config: PipelineConfig) -> CreativePipeline {
        let renderer = TextOverlayRenderer::with_font(config.text_overlay.clone(), Font::builtin()).unwrap();
        CreativePipeline::with_renderer(config, renderer).unwrap()
    }

    fn source() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(400, 300, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }))
    }

    #[test]
    fn test_compile_all_ratios() {
        let creative = pipeline(PipelineConfig::default())
            .compile(&source(), &CreativeRequest::new("Summer sale"))
            .unwrap();
        assert_eq!(creative.variants.len(), 3);
        assert_eq!(creative.variant("1:1").map(|v| (v.width, v.height)), Some((300, 300)));
        assert_eq!(creative.variant("16:9").map(|v| (v.width, v.height)), Some((400, 225)));
        assert!(creative.legal.is_none());
        assert!(creative.passed());
        assert_eq!(creative.manifest_hash.len(), 64);
    }

    #[test]
    fn test_localized_message_wins() {
        let request = CreativeRequest::new("Hello").with_localized("Hola");
        assert_eq!(request.effective_message(), "Hola");
        assert_eq!(CreativeRequest::new("Hello").with_localized("  ").effective_message(), "Hello");
    }

    #[test]
    fn test_configured_ratios_used_when_request_names_none() {
        let config = PipelineConfig { aspect_ratios: vec!["9:16".into()], ..Default::default() };
        let creative = pipeline(config).compile(&source(), &CreativeRequest::new("x")).unwrap();
        assert_eq!(creative.variants.len(), 1);
        assert_eq!(creative.variants[0].ratio, "9:16");
    }

    #[test]
    fn test_unknown_ratio_fails_whole_compile() {
        let request = CreativeRequest::new("x").with_ratios(["1:1", "3:2"]);
        let err = pipeline(PipelineConfig::default()).compile(&source(), &request).unwrap_err();
        assert!(matches!(err, PipelineError::Compositor(CompositorError::UnsupportedAspectRatio(ref r)) if r == "3:2"));
    }

    #[test]
    fn test_compliance_recorded_per_variant() {
        let mut config = PipelineConfig::default();
        config.compliance.enabled = true;
        config.compliance.legal.prohibited_words = vec!["free".into()];
        config.compliance.legal.severity_levels = HashMap::from([("free".to_string(), Severity::Blocking)]);

        let request = CreativeRequest::new("Free shipping").with_ratios(["1:1", "16:9"]);
        let creative = pipeline(config).compile(&source(), &request).unwrap();
        assert!(!creative.passed());
        assert_eq!(creative.legal.as_ref().map(|l| l.violations.len()), Some(1));
        for variant in &creative.variants {
            assert!(variant.brand.as_ref().is_some_and(|b| b.passed));
            assert!(!variant.passed());
        }
    }

    #[test]
    fn test_export_png_decodes() {
        let creative = pipeline(PipelineConfig::default())
            .compile(&source(), &CreativeRequest::new("Hi").with_ratios(["1:1"]))
            .unwrap();
        let exported = export_png(&creative.variants[0]).unwrap();
        assert_eq!(exported.filename, "1x1.png");
        let bytes = base64::engine::general_purpose::STANDARD.decode(&exported.data_base64).unwrap();
        assert_eq!(sha256_hex(&bytes), exported.hash);
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (300, 300));
    }

    #[test]
    fn test_serialized_creative_omits_pixels() {
        let creative = pipeline(PipelineConfig::default())
            .compile(&source(), &CreativeRequest::new("Hi").with_ratios(["1:1"]))
            .unwrap();
        let json = serde_json::to_value(&creative).unwrap();
        assert!(json["variants"][0].get("image").is_none());
        assert_eq!(json["variants"][0]["ratio"], "1:1");
    }
}
