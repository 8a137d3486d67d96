//! Font resolution, measurement and glyph rasterization.
//!
//! TrueType/OpenType faces are read with `ttf-parser`; outlines are flattened
//! to line segments and filled with a nonzero-winding coverage rasterizer.
//! When no font file can be loaded the built-in bitmap font is used.

use std::fs;
use std::path::{Path, PathBuf};

use image::RgbaImage;
use tracing::{debug, warn};

use super::blend_pixel;
use super::builtin;

/// Common system locations tried after the configured font sources.
const SYSTEM_FONTS: &[&str] = &[
    "/System/Library/Fonts/Helvetica.ttc",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
    "Arial.ttf",
    "Helvetica.ttf",
];

const FONT_EXTENSIONS: &[&str] = &["ttf", "ttc", "otf"];

/// Vertical samples per pixel row.
const SUBSAMPLES: u32 = 4;

/// Segments per flattened quadratic/cubic curve.
const CURVE_STEPS: u32 = 8;

#[derive(Debug, Clone)]
pub enum Font {
    TrueType(TrueTypeFont),
    Builtin,
}

impl Font {
    pub fn builtin() -> Self {
        Font::Builtin
    }

    /// Resolve a font from a family name or path, then the extra paths, then
    /// the system list. Never fails: falls back to the built-in font.
    pub fn resolve(family: &str, extra_paths: &[PathBuf]) -> Self {
        let mut candidates: Vec<PathBuf> = Vec::new();
        if !family.is_empty() {
            candidates.push(PathBuf::from(family));
            for ext in FONT_EXTENSIONS {
                candidates.push(PathBuf::from(format!("{}.{}", family, ext)));
            }
        }
        candidates.extend(extra_paths.iter().cloned());
        candidates.extend(SYSTEM_FONTS.iter().map(PathBuf::from));

        for path in &candidates {
            if let Some(font) = TrueTypeFont::load(path) {
                debug!(path = %path.display(), "resolved overlay font");
                return Font::TrueType(font);
            }
        }

        warn!(family, "no usable font file found, using built-in bitmap font");
        Font::Builtin
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self, Font::Builtin)
    }

    /// Width in pixels of a single line at `size`.
    pub fn line_width(&self, text: &str, size: u32) -> u32 {
        match self {
            Font::TrueType(font) => font.line_width(text, size),
            Font::Builtin => {
                text.chars().count() as u32 * builtin::CELL_WIDTH * builtin::scale_for(size)
            }
        }
    }

    /// Height in pixels of one line at `size`.
    pub fn line_height(&self, size: u32) -> u32 {
        match self {
            Font::TrueType(font) => font.line_height(size),
            Font::Builtin => builtin::CELL_HEIGHT * builtin::scale_for(size),
        }
    }

    /// Draw one line with its top-left corner at (`x`, `y`), clipped to the canvas.
    pub fn draw_line(
        &self,
        canvas: &mut RgbaImage,
        text: &str,
        x: i64,
        y: i64,
        size: u32,
        color: [u8; 3],
    ) {
        match self {
            Font::TrueType(font) => font.draw_line(canvas, text, x, y, size, color),
            Font::Builtin => draw_builtin_line(canvas, text, x, y, size, color),
        }
    }
}

fn draw_builtin_line(canvas: &mut RgbaImage, text: &str, x: i64, y: i64, size: u32, color: [u8; 3]) {
    let scale = builtin::scale_for(size) as i64;
    let cell = builtin::CELL_WIDTH as i64 * scale;
    let (cw, ch) = (canvas.width() as i64, canvas.height() as i64);

    for (i, c) in text.chars().enumerate() {
        let origin_x = x + i as i64 * cell;
        for col in 0..5u32 {
            for row in 0..7u32 {
                if !builtin::is_set(c, col, row) {
                    continue;
                }
                let bx = origin_x + col as i64 * scale;
                let by = y + row as i64 * scale;
                for py in by.max(0)..(by + scale).min(ch) {
                    for px in bx.max(0)..(bx + scale).min(cw) {
                        blend_pixel(canvas.get_pixel_mut(px as u32, py as u32), color, 1.0);
                    }
                }
            }
        }
    }
}

/// An owned font file. The face is re-parsed on use, which is cheap.
#[derive(Clone)]
pub struct TrueTypeFont {
    data: Vec<u8>,
}

impl std::fmt::Debug for TrueTypeFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrueTypeFont").field("bytes", &self.data.len()).finish()
    }
}

impl TrueTypeFont {
    /// Parse raw TTF/OTF/TTC bytes (first face of a collection).
    pub fn from_data(data: Vec<u8>) -> Option<Self> {
        ttf_parser::Face::parse(&data, 0).ok()?;
        Some(Self { data })
    }

    fn load(path: &Path) -> Option<Self> {
        if !path.is_file() {
            return None;
        }
        match fs::read(path) {
            Ok(data) => {
                let font = Self::from_data(data);
                if font.is_none() {
                    debug!(path = %path.display(), "font file could not be parsed");
                }
                font
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "font file unreadable");
                None
            }
        }
    }

    fn face(&self) -> Option<ttf_parser::Face<'_>> {
        ttf_parser::Face::parse(&self.data, 0).ok()
    }

    fn scale(face: &ttf_parser::Face<'_>, size: u32) -> f32 {
        size as f32 / face.units_per_em().max(1) as f32
    }

    fn line_width(&self, text: &str, size: u32) -> u32 {
        let Some(face) = self.face() else { return 0 };
        let scale = Self::scale(&face, size);
        let advance: f32 = text
            .chars()
            .filter_map(|c| face.glyph_index(c))
            .filter_map(|g| face.glyph_hor_advance(g))
            .map(|a| a as f32 * scale)
            .sum();
        advance.ceil() as u32
    }

    fn line_height(&self, size: u32) -> u32 {
        let Some(face) = self.face() else { return size };
        let scale = Self::scale(&face, size);
        ((face.ascender() as f32 - face.descender() as f32) * scale).ceil() as u32
    }

    fn draw_line(&self, canvas: &mut RgbaImage, text: &str, x: i64, y: i64, size: u32, color: [u8; 3]) {
        let Some(face) = self.face() else { return };
        let scale = Self::scale(&face, size);
        let baseline = y as f32 + face.ascender() as f32 * scale;

        let mut collector = EdgeCollector::new(scale, baseline);
        let mut pen = x as f32;
        for c in text.chars() {
            let Some(glyph) = face.glyph_index(c) else { continue };
            collector.origin_x = pen;
            face.outline_glyph(glyph, &mut collector);
            pen += face.glyph_hor_advance(glyph).unwrap_or(0) as f32 * scale;
        }

        fill_nonzero(canvas, &collector.edges, color);
    }
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
    winding: i32,
}

/// Flattens glyph outlines into pixel-space edges (y grows downward).
struct EdgeCollector {
    edges: Vec<Edge>,
    scale: f32,
    baseline: f32,
    origin_x: f32,
    start: (f32, f32),
    last: (f32, f32),
}

impl EdgeCollector {
    fn new(scale: f32, baseline: f32) -> Self {
        Self {
            edges: Vec::with_capacity(256),
            scale,
            baseline,
            origin_x: 0.0,
            start: (0.0, 0.0),
            last: (0.0, 0.0),
        }
    }

    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        (self.origin_x + x * self.scale, self.baseline - y * self.scale)
    }

    fn push(&mut self, to: (f32, f32)) {
        let from = self.last;
        if from.1 != to.1 {
            let (a, b, winding) = if from.1 < to.1 { (from, to, 1) } else { (to, from, -1) };
            self.edges.push(Edge { x0: a.0, y0: a.1, x1: b.0, y1: b.1, winding });
        }
        self.last = to;
    }
}

impl ttf_parser::OutlineBuilder for EdgeCollector {
    fn move_to(&mut self, x: f32, y: f32) {
        let p = self.map(x, y);
        self.start = p;
        self.last = p;
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let p = self.map(x, y);
        self.push(p);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let p0 = self.last;
        let c = self.map(x1, y1);
        let p = self.map(x, y);
        for i in 1..=CURVE_STEPS {
            let t = i as f32 / CURVE_STEPS as f32;
            let mt = 1.0 - t;
            self.push((
                mt * mt * p0.0 + 2.0 * mt * t * c.0 + t * t * p.0,
                mt * mt * p0.1 + 2.0 * mt * t * c.1 + t * t * p.1,
            ));
        }
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let p0 = self.last;
        let c1 = self.map(x1, y1);
        let c2 = self.map(x2, y2);
        let p = self.map(x, y);
        for i in 1..=CURVE_STEPS {
            let t = i as f32 / CURVE_STEPS as f32;
            let mt = 1.0 - t;
            let (a, b, c, d) = (mt * mt * mt, 3.0 * mt * mt * t, 3.0 * mt * t * t, t * t * t);
            self.push((
                a * p0.0 + b * c1.0 + c * c2.0 + d * p.0,
                a * p0.1 + b * c1.1 + c * c2.1 + d * p.1,
            ));
        }
    }

    fn close(&mut self) {
        let start = self.start;
        self.push(start);
    }
}

/// Scanline fill with nonzero winding and fractional horizontal coverage.
fn fill_nonzero(canvas: &mut RgbaImage, edges: &[Edge], color: [u8; 3]) {
    if edges.is_empty() {
        return;
    }
    let (cw, ch) = (canvas.width() as i64, canvas.height() as i64);
    let top = edges.iter().map(|e| e.y0).fold(f32::INFINITY, f32::min).floor() as i64;
    let bottom = edges.iter().map(|e| e.y1).fold(f32::NEG_INFINITY, f32::max).ceil() as i64;
    let left = edges.iter().map(|e| e.x0.min(e.x1)).fold(f32::INFINITY, f32::min).floor() as i64;
    let right = edges.iter().map(|e| e.x0.max(e.x1)).fold(f32::NEG_INFINITY, f32::max).ceil() as i64;

    let x_start = left.max(0);
    let x_end = right.min(cw);
    if x_start >= x_end {
        return;
    }
    let mut coverage = vec![0f32; (x_end - x_start) as usize];
    let mut crossings: Vec<(f32, i32)> = Vec::new();

    for py in top.max(0)..bottom.min(ch) {
        coverage.iter_mut().for_each(|c| *c = 0.0);

        for s in 0..SUBSAMPLES {
            let sy = py as f32 + (s as f32 + 0.5) / SUBSAMPLES as f32;
            crossings.clear();
            for e in edges {
                if sy >= e.y0 && sy < e.y1 {
                    let x = e.x0 + (sy - e.y0) * (e.x1 - e.x0) / (e.y1 - e.y0);
                    crossings.push((x, e.winding));
                }
            }
            crossings.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut winding = 0;
            for pair in crossings.windows(2) {
                winding += pair[0].1;
                if winding != 0 {
                    accumulate_span(&mut coverage, x_start, pair[0].0, pair[1].0);
                }
            }
        }

        for (i, c) in coverage.iter().enumerate() {
            if *c > 0.0 {
                let px = (x_start + i as i64) as u32;
                blend_pixel(canvas.get_pixel_mut(px, py as u32), color, c.min(1.0));
            }
        }
    }
}

fn accumulate_span(coverage: &mut [f32], x_start: i64, xa: f32, xb: f32) {
    let weight = 1.0 / SUBSAMPLES as f32;
    let first = (xa.floor() as i64).max(x_start);
    let last = (xb.ceil() as i64).min(x_start + coverage.len() as i64);
    for px in first..last {
        let overlap = xb.min(px as f32 + 1.0) - xa.max(px as f32);
        if overlap > 0.0 {
            coverage[(px - x_start) as usize] += overlap * weight;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_missing_font_falls_back_to_builtin() {
        let font = Font::resolve("/definitely/not/a/font.ttf", &[PathBuf::from("/nope.ttf")]);
        // Either a system font was found or the fallback kicked in; both are usable.
        assert!(font.line_height(40) > 0);
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        assert!(TrueTypeFont::from_data(b"not a font".to_vec()).is_none());
    }

    #[test]
    fn test_builtin_metrics_scale() {
        let font = Font::builtin();
        assert_eq!(font.line_height(48), 48);
        assert_eq!(font.line_width("abc", 48), 3 * 6 * 6);
        assert_eq!(font.line_width("", 48), 0);
    }

    #[test]
    fn test_builtin_draw_changes_pixels_and_clips() {
        let mut canvas = RgbaImage::from_pixel(40, 20, Rgba([0, 0, 0, 255]));
        Font::builtin().draw_line(&mut canvas, "H", -2, -2, 16, [255, 255, 255]);
        assert!(canvas.pixels().any(|p| p.0 == [255, 255, 255, 255]));
    }

    fn fixture_font() -> Font {
        Font::resolve(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/DejaVuSansMono.ttf"), &[])
    }

    #[test]
    fn test_truetype_metrics() {
        let font = fixture_font();
        assert!(!font.is_builtin());
        // 2048 units per em, 1233-unit advances, ascender 1901, descender -483
        assert_eq!(font.line_width("abc", 48), 87);
        assert_eq!(font.line_width("a", 48), 29);
        assert_eq!(font.line_width("", 48), 0);
        assert_eq!(font.line_height(48), 56);
    }

    #[test]
    fn test_truetype_glyph_stays_in_its_cell() {
        let font = fixture_font();
        let mut canvas = RgbaImage::from_pixel(80, 80, Rgba([0, 0, 0, 255]));
        font.draw_line(&mut canvas, "H", 10, 10, 48, [255, 255, 255]);

        let inked: Vec<(u32, u32)> = canvas
            .enumerate_pixels()
            .filter(|(_, _, p)| p.0[0] > 0)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert!(!inked.is_empty());
        assert!(inked.iter().all(|&(x, y)| (10..40).contains(&x) && (10..66).contains(&y)));
        assert!(canvas.pixels().any(|p| p.0[0] >= 250), "stems should be fully covered");
    }

    #[test]
    fn test_truetype_draw_clips_at_edges() {
        let font = fixture_font();
        let mut canvas = RgbaImage::from_pixel(30, 30, Rgba([0, 0, 0, 255]));
        font.draw_line(&mut canvas, "Hi", -12, -20, 48, [255, 255, 255]);
        font.draw_line(&mut canvas, "Hi", 25, 25, 48, [255, 255, 255]);
        assert!(canvas.pixels().any(|p| p.0[0] > 0));
    }

    #[test]
    fn test_fill_square_coverage() {
        let mut canvas = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255]));
        let edges = [
            Edge { x0: 2.0, y0: 2.0, x1: 2.0, y1: 6.0, winding: 1 },
            Edge { x0: 6.0, y0: 2.0, x1: 6.0, y1: 6.0, winding: -1 },
        ];
        fill_nonzero(&mut canvas, &edges, [255, 0, 0]);
        assert_eq!(canvas.get_pixel(3, 3).0, [255, 0, 0, 255]);
        assert_eq!(canvas.get_pixel(7, 3).0, [0, 0, 0, 255]);
        assert_eq!(canvas.get_pixel(3, 7).0, [0, 0, 0, 255]);
    }
}
