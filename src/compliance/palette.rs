//! Dominant colors by seeded k-means++ over a thumbnail.

use image::{DynamicImage, GenericImageView};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::color::to_hex;

pub const DOMINANT_COLORS: usize = 5;
pub const THUMBNAIL_SIZE: u32 = 100;

const SEED: u64 = 42;
const RESTARTS: usize = 10;
const MAX_ITERATIONS: usize = 300;
const TOLERANCE: f64 = 1e-4;

type Point = [f64; 3];

/// The `k` dominant colors of `image` as upper-case `#RRGGBB`.
///
/// Deterministic: the same image always yields the same centroids.
pub fn dominant_colors(image: &DynamicImage, k: usize) -> Vec<String> {
    let (w, h) = image.dimensions();
    let small = if w > THUMBNAIL_SIZE || h > THUMBNAIL_SIZE {
        image.thumbnail(THUMBNAIL_SIZE, THUMBNAIL_SIZE)
    } else {
        image.clone()
    };

    let points: Vec<Point> = small
        .to_rgb8()
        .pixels()
        .map(|p| [p.0[0] as f64, p.0[1] as f64, p.0[2] as f64])
        .collect();

    kmeans(&points, k)
        .into_iter()
        .map(|c| to_hex([channel(c[0]), channel(c[1]), channel(c[2])]))
        .collect()
}

fn channel(v: f64) -> u8 {
    v.clamp(0.0, 255.0) as u8
}

fn dist2(a: &Point, b: &Point) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)
}

fn nearest(point: &Point, centers: &[Point]) -> (usize, f64) {
    centers
        .iter()
        .enumerate()
        .map(|(i, c)| (i, dist2(point, c)))
        .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
}

/// Best of several k-means++ restarts by inertia.
pub fn kmeans(points: &[Point], k: usize) -> Vec<Point> {
    let k = k.min(points.len());
    if k == 0 {
        return Vec::new();
    }

    let mut rng = ChaCha8Rng::seed_from_u64(SEED);
    let mut best: Option<(f64, Vec<Point>)> = None;
    for _ in 0..RESTARTS {
        let centers = lloyd(points, seed_centers(points, k, &mut rng));
        let inertia: f64 = points.iter().map(|p| nearest(p, &centers).1).sum();
        if best.as_ref().map_or(true, |(b, _)| inertia < *b) {
            best = Some((inertia, centers));
        }
    }
    best.map(|(_, c)| c).unwrap_or_default()
}

fn seed_centers(points: &[Point], k: usize, rng: &mut ChaCha8Rng) -> Vec<Point> {
    let mut centers = Vec::with_capacity(k);
    centers.push(points[rng.gen_range(0..points.len())]);

    let mut d2: Vec<f64> = points.iter().map(|p| dist2(p, &centers[0])).collect();
    while centers.len() < k {
        let total: f64 = d2.iter().sum();
        let next = if total <= 0.0 {
            rng.gen_range(0..points.len())
        } else {
            let mut target = rng.gen::<f64>() * total;
            let mut chosen = points.len() - 1;
            for (i, w) in d2.iter().enumerate() {
                if target < *w {
                    chosen = i;
                    break;
                }
                target -= w;
            }
            chosen
        };
        let center = points[next];
        for (d, p) in d2.iter_mut().zip(points) {
            *d = d.min(dist2(p, &center));
        }
        centers.push(center);
    }
    centers
}

fn lloyd(points: &[Point], mut centers: Vec<Point>) -> Vec<Point> {
    let k = centers.len();
    for _ in 0..MAX_ITERATIONS {
        let mut sums = vec![[0.0; 3]; k];
        let mut counts = vec![0usize; k];
        for p in points {
            let (i, _) = nearest(p, &centers);
            for c in 0..3 {
                sums[i][c] += p[c];
            }
            counts[i] += 1;
        }

        let mut shift = 0.0;
        for i in 0..k {
            // Empty clusters keep their previous center
            if counts[i] == 0 {
                continue;
            }
            let n = counts[i] as f64;
            let updated = [sums[i][0] / n, sums[i][1] / n, sums[i][2] / n];
            shift += dist2(&centers[i], &updated);
            centers[i] = updated;
        }
        if shift <= TOLERANCE {
            break;
        }
    }
    centers
}
