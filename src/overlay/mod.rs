//! Text Overlay Renderer
//!
//! Scales a font to the image, wraps the message, lays a translucent panel
//! behind it and draws the text. Always renders into a copy.

mod builtin;
pub mod contrast;
pub mod font;
pub mod layout;

use std::path::PathBuf;

use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::color::{parse_hex, InvalidHexColor};

pub use contrast::ContrastPolicy;
pub use font::Font;
pub use layout::{font_size_for, wrap_text, Placement, Rect, TextBlock, TextPosition};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    InvalidColor(#[from] InvalidHexColor),

    #[error("Cannot render onto an image with zero area ({0}x{1})")]
    EmptyImage(u32, u32),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TextOverlayConfig {
    #[serde(default = "default_font_family")]
    pub font_family: String,
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    #[serde(default = "default_text_color", alias = "color")]
    pub text_color: String,
    #[serde(default)]
    pub position: TextPosition,
    #[serde(default = "default_padding")]
    pub padding: u32,
    #[serde(default = "default_background_opacity")]
    pub background_opacity: f32,
    /// Extra font files tried after `font_family`.
    #[serde(default)]
    pub font_paths: Vec<PathBuf>,
    #[serde(default)]
    pub contrast: ContrastPolicy,
}

fn default_font_family() -> String { "Arial".to_string() }
fn default_font_size() -> u32 { 48 }
fn default_text_color() -> String { "#FFFFFF".to_string() }
fn default_padding() -> u32 { 20 }
fn default_background_opacity() -> f32 { 0.6 }

impl Default for TextOverlayConfig {
    fn default() -> Self {
        Self {
            font_family: default_font_family(),
            font_size: default_font_size(),
            text_color: default_text_color(),
            position: TextPosition::default(),
            padding: default_padding(),
            background_opacity: default_background_opacity(),
            font_paths: Vec::new(),
            contrast: ContrastPolicy::default(),
        }
    }
}

/// "Over" composite of an opaque color at `alpha` onto `px`.
pub(crate) fn blend_pixel(px: &mut Rgba<u8>, color: [u8; 3], alpha: f32) {
    let a = alpha.clamp(0.0, 1.0);
    for (channel, target) in px.0.iter_mut().take(3).zip(color) {
        *channel = (*channel as f32 * (1.0 - a) + target as f32 * a).round() as u8;
    }
    let dst_alpha = px.0[3] as f32 / 255.0;
    px.0[3] = ((a + dst_alpha * (1.0 - a)) * 255.0).round() as u8;
}

/// The renderer holds one resolved font and a read-only config for a whole run.
#[derive(Debug, Clone)]
pub struct TextOverlayRenderer {
    config: TextOverlayConfig,
    font: Font,
    text_color: [u8; 3],
}

impl TextOverlayRenderer {
    /// Resolve the configured font (falling back to the built-in one).
    pub fn new(config: TextOverlayConfig) -> Result<Self, RenderError> {
        let font = Font::resolve(&config.font_family, &config.font_paths);
        Self::with_font(config, font)
    }

    pub fn with_font(config: TextOverlayConfig, font: Font) -> Result<Self, RenderError> {
        let text_color = parse_hex(&config.text_color)?;
        Ok(Self { config, font, text_color })
    }

    pub fn config(&self) -> &TextOverlayConfig {
        &self.config
    }

    pub fn font(&self) -> &Font {
        &self.font
    }

    pub fn font_size(&self, image_height: u32) -> u32 {
        font_size_for(self.config.font_size, image_height)
    }

    /// Wrap and measure `text` for an image of the given size.
    pub fn layout(&self, text: &str, width: u32, height: u32) -> TextBlock {
        let size = self.font_size(height);
        let max_width = width.saturating_sub(self.config.padding.saturating_mul(2));
        let lines = wrap_text(&self.font, text, size, max_width);
        TextBlock::measure(&self.font, lines, size)
    }

    /// Overlay with the configured base opacity.
    pub fn render_overlay(
        &self,
        image: &DynamicImage,
        text: &str,
        position: Option<TextPosition>,
    ) -> Result<DynamicImage, RenderError> {
        self.render(image, text, position, false)
    }

    /// Overlay whose panel opacity follows the brightness under the panel.
    pub fn render_overlay_adaptive(
        &self,
        image: &DynamicImage,
        text: &str,
        position: Option<TextPosition>,
    ) -> Result<DynamicImage, RenderError> {
        self.render(image, text, position, true)
    }

    /// Opacity the adaptive renderer would use for `region` of `image`.
    pub fn adapted_opacity(&self, image: &RgbaImage, region: Rect) -> f32 {
        let base = self.config.background_opacity;
        region
            .clamp_to(image.width(), image.height())
            .and_then(|r| contrast::mean_brightness(image, r))
            .map_or(base, |brightness| self.config.contrast.adjust(base, brightness))
    }

    fn render(
        &self,
        image: &DynamicImage,
        text: &str,
        position: Option<TextPosition>,
        adaptive: bool,
    ) -> Result<DynamicImage, RenderError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(RenderError::EmptyImage(width, height));
        }

        let mut canvas = image.to_rgba8();
        let block = self.layout(text, width, height);
        if block.is_empty() {
            return Ok(DynamicImage::ImageRgba8(canvas));
        }

        let position = position.unwrap_or(self.config.position);
        let placement = layout::place(&block, width, height, self.config.padding, position);

        let opacity = if adaptive {
            self.adapted_opacity(&canvas, placement.panel)
        } else {
            self.config.background_opacity
        };
        // Quantize like an 8-bit alpha channel would
        let alpha = (opacity.clamp(0.0, 1.0) * 255.0) as u8 as f32 / 255.0;
        if let Some(panel) = placement.panel.clamp_to(width, height) {
            for y in panel.top..panel.bottom {
                for x in panel.left..panel.right {
                    blend_pixel(canvas.get_pixel_mut(x as u32, y as u32), [0, 0, 0], alpha);
                }
            }
        }

        self.draw_block(&mut canvas, &block, &placement);
        Ok(DynamicImage::ImageRgba8(canvas))
    }

    fn draw_block(&self, canvas: &mut RgbaImage, block: &TextBlock, placement: &Placement) {
        let stride = (block.line_height + layout::LINE_SPACING) as i64;
        for (i, line) in block.lines.iter().enumerate() {
            let line_width = self.font.line_width(line, block.size) as i64;
            let x = placement.text_x + (block.width as i64 - line_width) / 2;
            let y = placement.text_y + i as i64 * stride;
            self.font.draw_line(canvas, line, x, y, block.size, self.text_color);
        }
    }
}
