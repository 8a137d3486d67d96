//! Font sizing, greedy word wrap and block placement.

use serde::{Deserialize, Serialize};

use super::font::Font;

pub const MIN_FONT_SIZE: u32 = 20;
pub const MAX_FONT_SIZE: u32 = 120;

/// Image height the base font size is tuned for.
const REFERENCE_HEIGHT: f64 = 1000.0;

/// Extra pixels between wrapped lines.
pub const LINE_SPACING: u32 = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextPosition {
    Top,
    #[default]
    Bottom,
    Center,
}

impl std::str::FromStr for TextPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "top" => Ok(Self::Top),
            "bottom" => Ok(Self::Bottom),
            "center" => Ok(Self::Center),
            other => Err(format!("unknown text position: {}", other)),
        }
    }
}

/// Font size for an image of `image_height` pixels, clamped to
/// [`MIN_FONT_SIZE`, `MAX_FONT_SIZE`].
pub fn font_size_for(base_size: u32, image_height: u32) -> u32 {
    let scaled = (base_size as f64 * (image_height as f64 / REFERENCE_HEIGHT)) as u32;
    scaled.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE)
}

/// Greedily pack words into lines no wider than `max_width`.
/// A word that is too wide on its own gets a line to itself.
pub fn wrap_text(font: &Font, text: &str, size: u32, max_width: u32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };

        if font.line_width(&candidate, size) <= max_width {
            current = candidate;
        } else {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            current = word.to_string();
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Wrapped text with its measured extent.
#[derive(Debug, Clone)]
pub struct TextBlock {
    pub lines: Vec<String>,
    pub size: u32,
    pub line_height: u32,
    pub width: u32,
    pub height: u32,
}

impl TextBlock {
    pub fn measure(font: &Font, lines: Vec<String>, size: u32) -> Self {
        let line_height = font.line_height(size);
        let width = lines.iter().map(|l| font.line_width(l, size)).max().unwrap_or(0);
        let count = lines.len() as u32;
        let height = if count == 0 {
            0
        } else {
            count * line_height + (count - 1) * LINE_SPACING
        };
        Self { lines, size, line_height, width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// An axis-aligned rectangle; may extend past the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl Rect {
    /// Intersection with a `width` x `height` image; `None` when empty.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Rect> {
        let r = Rect {
            left: self.left.max(0),
            top: self.top.max(0),
            right: self.right.min(width as i64),
            bottom: self.bottom.min(height as i64),
        };
        (r.left < r.right && r.top < r.bottom).then_some(r)
    }
}

/// Where the block and its background panel land on the image.
#[derive(Debug, Clone, Copy)]
pub struct Placement {
    pub text_x: i64,
    pub text_y: i64,
    pub panel: Rect,
}

/// Center horizontally; anchor vertically per `position`, offset by padding.
pub fn place(block: &TextBlock, width: u32, height: u32, padding: u32, position: TextPosition) -> Placement {
    let (w, h, pad) = (width as i64, height as i64, padding as i64);
    let (bw, bh) = (block.width as i64, block.height as i64);

    let text_x = (w - bw).div_euclid(2);
    let text_y = match position {
        TextPosition::Bottom => h - bh - pad * 2,
        TextPosition::Top => pad * 2,
        TextPosition::Center => (h - bh).div_euclid(2),
    };

    Placement {
        text_x,
        text_y,
        panel: Rect {
            left: text_x - pad,
            top: text_y - pad,
            right: text_x + bw + pad,
            bottom: text_y + bh + pad,
        },
    }
}
