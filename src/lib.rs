//! CreativeForge Core - Creative Variant Compiler
//!
//! One source image and one message in; cropped, captioned and checked
//! variants out.
//!
//! # The Rules
//! 1. The source image is never modified
//! 2. Every variant of a run uses the same font, policy and message
//! 3. An unknown ratio fails the whole run before any pixel work
//! 4. Policy failures are results, not errors
//! 5. Same input, same pixels, same hashes

pub mod aspect;
pub mod color;
pub mod compliance;
pub mod compositor;
pub mod config;
pub mod hashing;
pub mod overlay;
pub mod pipeline;

pub use aspect::{AspectRatio, CropAnchor, CropWindow, RatioRegistry};
pub use compliance::{ComplianceChecker, ComplianceError, ComplianceResult, Severity};
pub use compositor::{Compositor, CompositorError, Variant, Variants};
pub use config::{ConfigError, PipelineConfig};
pub use hashing::{canonical_json, compute_job_hash, compute_manifest_hash, pixel_hash};
pub use overlay::{RenderError, TextOverlayConfig, TextOverlayRenderer, TextPosition};
pub use pipeline::{export_png, CompiledCreative, CreativePipeline, CreativeRequest, ExportedFile, PipelineError};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
