//! Logo detection by zero-mean normalized cross-correlation over RGB.
//!
//! Every placement of the template inside the image is scored. Small searches
//! correlate directly; large ones compute the whole numerator surface in the
//! frequency domain. Both paths share the summed-area denominators and give
//! the same maximum.

use std::sync::Arc;

use image::RgbImage;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftDirection, FftPlanner};

/// Multiply-adds (per channel) above which correlation moves to the
/// frequency domain.
const DIRECT_BUDGET: u64 = 4_000_000;

/// Pixels are integers, so a window that is not flat has energy >= 1 - 1/n.
const FLAT_ENERGY: f64 = 0.5;

/// Best correlation score of `template` over all placements inside `image`,
/// in [0, 1] (anti-correlation counts as no match). Zero when the template
/// does not fit or either side is flat.
pub fn match_template(image: &RgbImage, template: &RgbImage) -> f64 {
    let (iw, ih) = image.dimensions();
    let (tw, th) = template.dimensions();
    if tw == 0 || th == 0 || tw > iw || th > ih {
        return 0.0;
    }

    let Some(matcher) = Correlator::new(template) else { return 0.0 };
    let integral = Integral::new(image);

    if search_work(iw, ih, tw, th) <= DIRECT_BUDGET {
        matcher.best_in(image, &integral, 0..iw - tw + 1, 0..ih - th + 1).0
    } else {
        matcher.best_spectral(image, &integral)
    }
}

fn search_work(iw: u32, ih: u32, tw: u32, th: u32) -> u64 {
    let positions = (iw - tw + 1) as u64 * (ih - th + 1) as u64;
    positions * (tw as u64 * th as u64)
}

/// Per-channel summed-area tables of values and squares.
struct Integral {
    stride: usize,
    sum: Vec<[f64; 3]>,
    sq: Vec<[f64; 3]>,
}

impl Integral {
    fn new(image: &RgbImage) -> Self {
        let (w, h) = (image.width() as usize, image.height() as usize);
        let stride = w + 1;
        let mut sum = vec![[0.0; 3]; stride * (h + 1)];
        let mut sq = vec![[0.0; 3]; stride * (h + 1)];
        let raw = image.as_raw();

        for y in 0..h {
            let mut row = [0.0; 3];
            let mut row_sq = [0.0; 3];
            for x in 0..w {
                let base = (y * w + x) * 3;
                let here = (y + 1) * stride + x + 1;
                let above = y * stride + x + 1;
                for c in 0..3 {
                    let v = raw[base + c] as f64;
                    row[c] += v;
                    row_sq[c] += v * v;
                    sum[here][c] = sum[above][c] + row[c];
                    sq[here][c] = sq[above][c] + row_sq[c];
                }
            }
        }
        Self { stride, sum, sq }
    }

    fn window(&self, table: &[[f64; 3]], x: usize, y: usize, w: usize, h: usize, c: usize) -> f64 {
        let s = self.stride;
        table[(y + h) * s + x + w][c] - table[y * s + x + w][c] - table[(y + h) * s + x][c]
            + table[y * s + x][c]
    }

    /// Sum of squared deviations from the window mean, over all channels.
    fn energy(&self, x: usize, y: usize, w: usize, h: usize) -> f64 {
        let n = (w * h) as f64;
        (0..3)
            .map(|c| {
                let s = self.window(&self.sum, x, y, w, h, c);
                self.window(&self.sq, x, y, w, h, c) - s * s / n
            })
            .sum()
    }
}

/// A zero-mean template ready for correlation.
struct Correlator {
    width: usize,
    height: usize,
    zero_mean: Vec<[f64; 3]>,
    energy: f64,
}

impl Correlator {
    fn new(template: &RgbImage) -> Option<Self> {
        let (w, h) = (template.width() as usize, template.height() as usize);
        let n = (w * h) as f64;
        let mut mean = [0.0; 3];
        for p in template.pixels() {
            for c in 0..3 {
                mean[c] += p.0[c] as f64 / n;
            }
        }

        let zero_mean: Vec<[f64; 3]> = template
            .pixels()
            .map(|p| [p.0[0] as f64 - mean[0], p.0[1] as f64 - mean[1], p.0[2] as f64 - mean[2]])
            .collect();
        let energy: f64 = zero_mean.iter().flat_map(|v| v.iter()).map(|v| v * v).sum();

        (energy > FLAT_ENERGY).then_some(Self { width: w, height: h, zero_mean, energy })
    }

    /// Normalize a raw cross term against the window at (`x`, `y`).
    fn normalize(&self, cross: f64, integral: &Integral, x: usize, y: usize) -> f64 {
        let window_energy = integral.energy(x, y, self.width, self.height);
        if window_energy <= FLAT_ENERGY {
            return 0.0;
        }
        (cross / (self.energy * window_energy).sqrt()).clamp(-1.0, 1.0)
    }

    fn score_at(&self, image: &RgbImage, integral: &Integral, x: u32, y: u32) -> f64 {
        let (x, y) = (x as usize, y as usize);
        let w = self.width;

        // The template is zero-mean, so the window mean drops out of the numerator
        let raw = image.as_raw();
        let iw = image.width() as usize;
        let mut cross = 0.0;
        for ty in 0..self.height {
            let row = ((y + ty) * iw + x) * 3;
            let tpl = &self.zero_mean[ty * w..(ty + 1) * w];
            for (tx, t) in tpl.iter().enumerate() {
                let base = row + tx * 3;
                cross += t[0] * raw[base] as f64 + t[1] * raw[base + 1] as f64 + t[2] * raw[base + 2] as f64;
            }
        }

        self.normalize(cross, integral, x, y)
    }

    fn best_in(
        &self,
        image: &RgbImage,
        integral: &Integral,
        xs: std::ops::Range<u32>,
        ys: std::ops::Range<u32>,
    ) -> (f64, u32, u32) {
        let mut best = (0.0, 0, 0);
        for y in ys {
            for x in xs.clone() {
                let score = self.score_at(image, integral, x, y);
                if score > best.0 {
                    best = (score, x, y);
                }
            }
        }
        best
    }

    /// Scores for every placement, row-major over the valid offsets.
    fn spectral_scores(&self, image: &RgbImage, integral: &Integral) -> Vec<f64> {
        let (iw, ih) = (image.width() as usize, image.height() as usize);
        let cross = self.cross_surface(image);

        let mut scores = Vec::with_capacity((iw - self.width + 1) * (ih - self.height + 1));
        for y in 0..=ih - self.height {
            for x in 0..=iw - self.width {
                scores.push(self.normalize(cross[y * iw + x], integral, x, y));
            }
        }
        scores
    }

    fn best_spectral(&self, image: &RgbImage, integral: &Integral) -> f64 {
        self.spectral_scores(image, integral).into_iter().fold(0.0, f64::max)
    }

    /// Circular cross-correlation of image and zero-mean template, summed
    /// over channels. Offsets that keep the template inside the image never
    /// wrap, so those entries are exact.
    fn cross_surface(&self, image: &RgbImage) -> Vec<f64> {
        let (iw, ih) = (image.width() as usize, image.height() as usize);
        let mut planner = FftPlanner::new();
        let forward = Spectrum2d::new(&mut planner, iw, ih, FftDirection::Forward);
        let inverse = Spectrum2d::new(&mut planner, iw, ih, FftDirection::Inverse);

        let raw = image.as_raw();
        let mut product = vec![Complex::new(0.0, 0.0); iw * ih];
        for c in 0..3 {
            let mut pixels: Vec<Complex<f64>> = raw
                .iter()
                .skip(c)
                .step_by(3)
                .map(|&v| Complex::new(v as f64, 0.0))
                .collect();
            forward.process(&mut pixels);

            let mut kernel = vec![Complex::new(0.0, 0.0); iw * ih];
            for ty in 0..self.height {
                for tx in 0..self.width {
                    kernel[ty * iw + tx] = Complex::new(self.zero_mean[ty * self.width + tx][c], 0.0);
                }
            }
            forward.process(&mut kernel);

            for ((acc, p), k) in product.iter_mut().zip(&pixels).zip(&kernel) {
                *acc += *p * k.conj();
            }
        }

        inverse.process(&mut product);
        let scale = (iw * ih) as f64;
        product.into_iter().map(|v| v.re / scale).collect()
    }
}

/// Row-major 2-D transform from 1-D row and column passes.
struct Spectrum2d {
    width: usize,
    height: usize,
    rows: Arc<dyn Fft<f64>>,
    columns: Arc<dyn Fft<f64>>,
}

impl Spectrum2d {
    fn new(planner: &mut FftPlanner<f64>, width: usize, height: usize, direction: FftDirection) -> Self {
        Self {
            width,
            height,
            rows: planner.plan_fft(width, direction),
            columns: planner.plan_fft(height, direction),
        }
    }

    fn process(&self, data: &mut [Complex<f64>]) {
        self.rows.process(data);
        let mut transposed = transpose(data, self.width, self.height);
        self.columns.process(&mut transposed);
        data.copy_from_slice(&transpose(&transposed, self.height, self.width));
    }
}

fn transpose(data: &[Complex<f64>], width: usize, height: usize) -> Vec<Complex<f64>> {
    let mut out = vec![Complex::new(0.0, 0.0); data.len()];
    for y in 0..height {
        for x in 0..width {
            out[x * height + y] = data[y * width + x];
        }
    }
    out
}
