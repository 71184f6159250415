//! Geometric and intensity features of the dominant face in a frame.

use image::imageops;
use serde::{Deserialize, Serialize};

use crate::detect::{largest_face, BoundingBox, FaceDetector, SkinToneDetector};
use crate::frame::Frame;
use crate::openness;

/// Eyes considered for openness averaging.
pub const MAX_OPENNESS_EYES: usize = 2;

/// Minimum number of located eyes for a face to be scored at all.
pub const MIN_EYES: usize = 2;

/// The selected face and its eyes. Eye boxes are face-local.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceObservation {
    pub face: BoundingBox,
    pub eyes: Vec<BoundingBox>,
    pub frame_width: u32,
    pub frame_height: u32,
}

impl FaceObservation {
    /// Mean eye area over all located eyes divided by the face area.
    pub fn eye_to_face_ratio(&self) -> f64 {
        let face_area = self.face.area();
        if self.eyes.is_empty() || face_area == 0 {
            return 0.0;
        }
        let total: u64 = self.eyes.iter().map(BoundingBox::area).sum();
        let mean = total as f64 / self.eyes.len() as f64;
        mean / face_area as f64
    }

    /// Horizontal offset of the face from the frame centre, in `[0, 1]`
    /// where 1 means perfectly centred.
    pub fn centering(&self) -> f64 {
        if self.frame_width == 0 {
            return 0.0;
        }
        let half_width = f64::from(self.frame_width) / 2.0;
        let offset = (self.face.center_x() - half_width).abs();
        (1.0 - offset / half_width).max(0.0)
    }

    pub fn face_area_ratio(&self) -> f64 {
        let frame_area = u64::from(self.frame_width) * u64::from(self.frame_height);
        if frame_area == 0 {
            return 0.0;
        }
        self.face.area() as f64 / frame_area as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFeatures {
    pub eye_to_face_ratio: f64,
    /// Mean openness of the usable eyes; `None` when no eye crop was usable.
    pub openness: Option<f64>,
    pub centering: f64,
    pub face_area_ratio: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeatureExtraction {
    NoFace,
    /// A face was found but fewer than [`MIN_EYES`] eyes.
    EyesMissing(FaceObservation),
    Features(FaceObservation, RawFeatures),
}

pub struct FeatureExtractor<D = SkinToneDetector> {
    detector: D,
}

impl Default for FeatureExtractor<SkinToneDetector> {
    fn default() -> Self {
        Self::new(SkinToneDetector::default())
    }
}

impl<D: FaceDetector> FeatureExtractor<D> {
    pub fn new(detector: D) -> Self {
        Self { detector }
    }

    pub fn observe(&self, frame: &Frame) -> Option<FaceObservation> {
        let faces = self.detector.faces(frame);
        let face = largest_face(&faces)?;
        let eyes = self.detector.eyes(frame, &face);
        Some(FaceObservation {
            face,
            eyes,
            frame_width: frame.width(),
            frame_height: frame.height(),
        })
    }

    pub fn extract(&self, frame: &Frame) -> FeatureExtraction {
        let Some(observation) = self.observe(frame) else {
            return FeatureExtraction::NoFace;
        };
        if observation.eyes.len() < MIN_EYES {
            return FeatureExtraction::EyesMissing(observation);
        }

        let features = RawFeatures {
            eye_to_face_ratio: observation.eye_to_face_ratio(),
            openness: mean_openness(frame, &observation),
            centering: observation.centering(),
            face_area_ratio: observation.face_area_ratio(),
        };
        FeatureExtraction::Features(observation, features)
    }
}

/// Average combined openness over the first eyes that lie inside the face.
fn mean_openness(frame: &Frame, observation: &FaceObservation) -> Option<f64> {
    let face = observation.face;
    if !face.fits_within(frame.width(), frame.height()) {
        return None;
    }

    let readings: Vec<f64> = observation
        .eyes
        .iter()
        .filter(|eye| eye.width > 0 && eye.height > 0 && eye.fits_within(face.width, face.height))
        .take(MAX_OPENNESS_EYES)
        .map(|eye| {
            let crop = imageops::crop_imm(
                frame.gray(),
                face.x + eye.x,
                face.y + eye.y,
                eye.width,
                eye.height,
            )
            .to_image();
            openness::estimate(&crop).combined
        })
        .collect();

    if readings.is_empty() {
        None
    } else {
        Some(readings.iter().sum::<f64>() / readings.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedDetector {
        faces: Vec<BoundingBox>,
        eyes: Vec<BoundingBox>,
    }

    impl FaceDetector for FixedDetector {
        fn faces(&self, _frame: &Frame) -> Vec<BoundingBox> {
            self.faces.clone()
        }

        fn eyes(&self, _frame: &Frame, _face: &BoundingBox) -> Vec<BoundingBox> {
            self.eyes.clone()
        }
    }

    fn blank_frame() -> Frame {
        Frame::from_rgb(100, 100, vec![128; 100 * 100 * 3]).unwrap()
    }

    #[test]
    fn test_no_face() {
        let extractor = FeatureExtractor::new(FixedDetector {
            faces: vec![],
            eyes: vec![],
        });
        assert_eq!(extractor.extract(&blank_frame()), FeatureExtraction::NoFace);
    }

    #[test]
    fn test_single_eye_is_eyes_missing() {
        let extractor = FeatureExtractor::new(FixedDetector {
            faces: vec![BoundingBox::new(20, 20, 40, 40)],
            eyes: vec![BoundingBox::new(5, 5, 8, 4)],
        });
        assert!(matches!(
            extractor.extract(&blank_frame()),
            FeatureExtraction::EyesMissing(_)
        ));
    }

    #[test]
    fn test_largest_face_is_used() {
        let small = BoundingBox::new(0, 0, 10, 10);
        let large = BoundingBox::new(40, 30, 20, 30);
        let extractor = FeatureExtractor::new(FixedDetector {
            faces: vec![small, large],
            eyes: vec![],
        });
        let observation = extractor.observe(&blank_frame()).unwrap();
        assert_eq!(observation.face, large);
    }

    #[test]
    fn test_geometry() {
        let observation = FaceObservation {
            face: BoundingBox::new(50, 0, 20, 10),
            eyes: vec![BoundingBox::new(1, 1, 4, 2), BoundingBox::new(10, 1, 2, 2)],
            frame_width: 120,
            frame_height: 100,
        };
        // mean eye area 6 over face area 200
        assert!((observation.eye_to_face_ratio() - 0.03).abs() < 1e-12);
        // centre x 60 == frame centre
        assert_eq!(observation.centering(), 1.0);
        assert!((observation.face_area_ratio() - 200.0 / 12000.0).abs() < 1e-12);

        let edge = FaceObservation {
            face: BoundingBox::new(100, 0, 20, 10),
            ..observation
        };
        // centre x 110 → offset 50 of 60
        assert!((edge.centering() - 1.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_eyes_outside_face_do_not_count_for_openness() {
        let extractor = FeatureExtractor::new(FixedDetector {
            faces: vec![BoundingBox::new(20, 20, 40, 40)],
            eyes: vec![BoundingBox::new(35, 5, 10, 4), BoundingBox::new(30, 38, 4, 4)],
        });
        match extractor.extract(&blank_frame()) {
            FeatureExtraction::Features(_, features) => assert_eq!(features.openness, None),
            other => panic!("unexpected {other:?}"),
        }
    }
}
