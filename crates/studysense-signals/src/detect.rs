//! Face and eye localisation.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::frame::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn center_x(&self) -> f64 {
        f64::from(self.x) + f64::from(self.width) / 2.0
    }

    /// Whether the box lies entirely inside a `width` x `height` region.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        u64::from(self.x) + u64::from(self.width) <= u64::from(width)
            && u64::from(self.y) + u64::from(self.height) <= u64::from(height)
    }
}

/// Locates faces in a frame and eyes within a face.
///
/// Faces are in frame coordinates; eyes are relative to the face box's
/// top-left corner. Both lists come back in scan order.
pub trait FaceDetector: Send + Sync {
    fn faces(&self, frame: &Frame) -> Vec<BoundingBox>;

    fn eyes(&self, frame: &Frame, face: &BoundingBox) -> Vec<BoundingBox>;
}

/// The largest box by area; the earliest one wins a tie.
pub fn largest_face(faces: &[BoundingBox]) -> Option<BoundingBox> {
    faces.iter().copied().fold(None, |best, candidate| match best {
        Some(current) if current.area() >= candidate.area() => Some(current),
        _ => Some(candidate),
    })
}

#[derive(Debug, Clone)]
pub struct SkinToneConfig {
    /// Minimum face box area as a fraction of the frame.
    pub min_face_fraction: f64,
    /// Accepted width / height range of a face box.
    pub face_aspect: (f64, f64),
    /// Vertical band of the face box (fractions of its height) searched for eyes.
    pub eye_band: (f64, f64),
    /// Accepted eye area range as a fraction of the face box.
    pub eye_area_fraction: (f64, f64),
}

impl Default for SkinToneConfig {
    fn default() -> Self {
        Self {
            min_face_fraction: 0.01,
            face_aspect: (0.5, 2.0),
            eye_band: (0.15, 0.6),
            eye_area_fraction: (0.002, 0.1),
        }
    }
}

/// Colour-segmentation detector.
///
/// Faces are connected regions of skin-toned pixels (YCbCr chroma gate);
/// eyes are non-skin islands in the upper part of the face that do not touch
/// the face box's sides.
#[derive(Debug, Clone, Default)]
pub struct SkinToneDetector {
    config: SkinToneConfig,
}

impl SkinToneDetector {
    pub fn new(config: SkinToneConfig) -> Self {
        Self { config }
    }
}

/// YCbCr chroma gate (Cb in 77..=127, Cr in 133..=173).
pub fn is_skin(rgb: [u8; 3]) -> bool {
    let r = f64::from(rgb[0]);
    let g = f64::from(rgb[1]);
    let b = f64::from(rgb[2]);
    let cb = 128.0 - 0.168736 * r - 0.331264 * g + 0.5 * b;
    let cr = 128.0 + 0.5 * r - 0.418688 * g - 0.081312 * b;
    (77.0..=127.0).contains(&cb) && (133.0..=173.0).contains(&cr)
}

impl FaceDetector for SkinToneDetector {
    fn faces(&self, frame: &Frame) -> Vec<BoundingBox> {
        let rgb = frame.rgb();
        let (width, height) = rgb.dimensions();
        let frame_area = f64::from(width) * f64::from(height);
        let (min_aspect, max_aspect) = self.config.face_aspect;

        connected_regions(width, height, |x, y| is_skin(rgb.get_pixel(x, y).0))
            .into_iter()
            .filter(|bounds| {
                let aspect = f64::from(bounds.width) / f64::from(bounds.height.max(1));
                bounds.area() as f64 >= frame_area * self.config.min_face_fraction
                    && (min_aspect..=max_aspect).contains(&aspect)
            })
            .collect()
    }

    fn eyes(&self, frame: &Frame, face: &BoundingBox) -> Vec<BoundingBox> {
        if !face.fits_within(frame.width(), frame.height()) || face.width < 3 {
            return Vec::new();
        }
        let rgb = frame.rgb();
        let band_top = (f64::from(face.height) * self.config.eye_band.0).floor() as u32;
        let band_bottom = (f64::from(face.height) * self.config.eye_band.1).ceil() as u32;
        let band_bottom = band_bottom.min(face.height);
        if band_bottom <= band_top {
            return Vec::new();
        }

        let face_area = face.area() as f64;
        let (min_fraction, max_fraction) = self.config.eye_area_fraction;

        connected_regions(face.width, band_bottom - band_top, |x, y| {
            !is_skin(rgb.get_pixel(face.x + x, face.y + band_top + y).0)
        })
        .into_iter()
        .filter(|b| {
            let touches_side = b.x == 0 || b.x + b.width >= face.width;
            let fraction = b.area() as f64 / face_area;
            !touches_side && (min_fraction..=max_fraction).contains(&fraction)
        })
        .map(|b| BoundingBox {
            y: b.y + band_top,
            ..b
        })
        .collect()
    }
}

/// 4-connected components of `mask` over a `width` x `height` grid, in the
/// order their first pixel is met by a row-major scan.
fn connected_regions(width: u32, height: u32, mask: impl Fn(u32, u32) -> bool) -> Vec<BoundingBox> {
    let w = width as usize;
    let mut visited = vec![false; w * height as usize];
    let mut regions = Vec::new();
    let mut queue = VecDeque::new();

    for start_y in 0..height {
        for start_x in 0..width {
            let idx = start_y as usize * w + start_x as usize;
            if visited[idx] {
                continue;
            }
            visited[idx] = true;
            if !mask(start_x, start_y) {
                continue;
            }

            let (mut min_x, mut min_y, mut max_x, mut max_y) = (start_x, start_y, start_x, start_y);
            queue.push_back((start_x, start_y));

            while let Some((x, y)) = queue.pop_front() {
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);

                let neighbours = [
                    (x.wrapping_sub(1), y),
                    (x + 1, y),
                    (x, y.wrapping_sub(1)),
                    (x, y + 1),
                ];
                for (nx, ny) in neighbours {
                    if nx >= width || ny >= height {
                        continue;
                    }
                    let n_idx = ny as usize * w + nx as usize;
                    if visited[n_idx] {
                        continue;
                    }
                    if mask(nx, ny) {
                        visited[n_idx] = true;
                        queue.push_back((nx, ny));
                    }
                }
            }

            regions.push(BoundingBox::new(
                min_x,
                min_y,
                max_x - min_x + 1,
                max_y - min_y + 1,
            ));
        }
    }

    regions
}
