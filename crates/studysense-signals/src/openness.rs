//! Eye-openness estimation from a grayscale eye crop.
//!
//! Three independent estimators are blended with fixed weights:
//! - intensity: share of pixels brighter than [`BRIGHT_PIXEL_THRESHOLD`]
//! - variance: pixel variance normalised by [`VARIANCE_NORMALIZER`]
//! - edges: Canny edge density relative to [`EDGE_DENSITY_NORMALIZER`] of the crop

use image::GrayImage;
use serde::{Deserialize, Serialize};

pub const BRIGHT_PIXEL_THRESHOLD: u8 = 80;
pub const VARIANCE_NORMALIZER: f64 = 1000.0;
pub const EDGE_DENSITY_NORMALIZER: f64 = 0.1;
pub const CANNY_LOW_THRESHOLD: f64 = 50.0;
pub const CANNY_HIGH_THRESHOLD: f64 = 150.0;

pub const INTENSITY_WEIGHT: f64 = 0.4;
pub const VARIANCE_WEIGHT: f64 = 0.3;
pub const EDGE_WEIGHT: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpennessEstimate {
    pub intensity: f64,
    pub variance: f64,
    pub edges: f64,
    pub combined: f64,
}

pub fn estimate(eye: &GrayImage) -> OpennessEstimate {
    let intensity = intensity_ratio(eye);
    let variance = variance_openness(eye);
    let edges = edge_density(eye);
    OpennessEstimate {
        intensity,
        variance,
        edges,
        combined: INTENSITY_WEIGHT * intensity + VARIANCE_WEIGHT * variance + EDGE_WEIGHT * edges,
    }
}

pub fn intensity_ratio(eye: &GrayImage) -> f64 {
    let total = eye.pixels().len();
    if total == 0 {
        return 0.0;
    }
    let bright = eye
        .pixels()
        .filter(|p| p.0[0] > BRIGHT_PIXEL_THRESHOLD)
        .count();
    bright as f64 / total as f64
}

pub fn variance_openness(eye: &GrayImage) -> f64 {
    let n = eye.pixels().len();
    if n == 0 {
        return 0.0;
    }
    let mean = eye.pixels().map(|p| f64::from(p.0[0])).sum::<f64>() / n as f64;
    let variance = eye
        .pixels()
        .map(|p| (f64::from(p.0[0]) - mean).powi(2))
        .sum::<f64>()
        / n as f64;
    (variance / VARIANCE_NORMALIZER).min(1.0)
}

pub fn edge_density(eye: &GrayImage) -> f64 {
    let total = eye.pixels().len();
    if total == 0 {
        return 0.0;
    }
    let edges = canny(eye, CANNY_LOW_THRESHOLD, CANNY_HIGH_THRESHOLD);
    let edge_pixels = edges.pixels().filter(|p| p.0[0] > 0).count();
    (edge_pixels as f64 / (total as f64 * EDGE_DENSITY_NORMALIZER)).min(1.0)
}

/// Canny edge map (255 = edge) using 3x3 Sobel gradients with L1 magnitude,
/// non-maximum suppression and hysteresis. Border pixels are never edges.
pub fn canny(img: &GrayImage, low: f64, high: f64) -> GrayImage {
    let (width, height) = img.dimensions();
    let mut out = GrayImage::new(width, height);
    if width < 3 || height < 3 {
        return out;
    }

    let w = width as usize;
    let h = height as usize;
    let px = |x: usize, y: usize| f64::from(img.get_pixel(x as u32, y as u32).0[0]);

    let mut gx = vec![0.0f64; w * h];
    let mut gy = vec![0.0f64; w * h];
    let mut magnitude = vec![0.0f64; w * h];
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let dx = (px(x + 1, y - 1) + 2.0 * px(x + 1, y) + px(x + 1, y + 1))
                - (px(x - 1, y - 1) + 2.0 * px(x - 1, y) + px(x - 1, y + 1));
            let dy = (px(x - 1, y + 1) + 2.0 * px(x, y + 1) + px(x + 1, y + 1))
                - (px(x - 1, y - 1) + 2.0 * px(x, y - 1) + px(x + 1, y - 1));
            let i = y * w + x;
            gx[i] = dx;
            gy[i] = dy;
            magnitude[i] = dx.abs() + dy.abs();
        }
    }

    const TAN_22_5: f64 = 0.414_213_562_373_095;
    const TAN_67_5: f64 = 2.414_213_562_373_095;

    // 0 = suppressed, 1 = weak, 2 = strong
    let mut class = vec![0u8; w * h];
    let mut stack = Vec::new();
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let i = y * w + x;
            let m = magnitude[i];
            if m <= low {
                continue;
            }
            let (ax, ay) = (gx[i].abs(), gy[i].abs());
            let (a, b) = if ay <= ax * TAN_22_5 {
                (i - 1, i + 1)
            } else if ay >= ax * TAN_67_5 {
                (i - w, i + w)
            } else if gx[i] * gy[i] > 0.0 {
                (i - w - 1, i + w + 1)
            } else {
                (i - w + 1, i + w - 1)
            };
            if m > magnitude[a] && m >= magnitude[b] {
                if m > high {
                    class[i] = 2;
                    stack.push(i);
                } else {
                    class[i] = 1;
                }
            }
        }
    }

    while let Some(i) = stack.pop() {
        let (x, y) = (i % w, i / w);
        out.put_pixel(x as u32, y as u32, image::Luma([255]));
        for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
            for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                let n = ny * w + nx;
                if class[n] == 1 {
                    class[n] = 2;
                    stack.push(n);
                }
            }
        }
    }

    out
}
