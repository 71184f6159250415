//! Maps raw face features to gaze and attention quality scores.

use serde::{Deserialize, Serialize};

use crate::bands::{Band, RangeTable};
use crate::features::RawFeatures;
use crate::noise::NoiseSource;
use crate::saturate;

/// Base gaze score by mean-eye-area / face-area.
pub const EYE_RATIO_TIERS: RangeTable<f64> = RangeTable::new(
    &[
        (Band::Within(0.01, 0.05), 0.8),
        (Band::Within(0.005, 0.01), 0.6),
        (Band::Within(0.05, 0.1), 0.6),
    ],
    0.3,
);

/// Gaze multiplier by averaged eye openness.
pub const OPENNESS_MODULATION: RangeTable<f64> = RangeTable::new(
    &[
        (Band::Below(0.15), 0.3),
        (Band::Below(0.25), 0.6),
        (Band::Above(0.4), 1.1),
    ],
    1.0,
);

/// Size appropriateness by face-area / frame-area.
pub const FACE_SIZE_TIERS: RangeTable<f64> = RangeTable::new(
    &[
        (Band::Within(0.02, 0.15), 1.0),
        (Band::Within(0.01, 0.02), 0.7),
        (Band::Within(0.15, 0.25), 0.7),
    ],
    0.4,
);

pub const CENTERING_WEIGHT: f64 = 0.6;
pub const SIZE_WEIGHT: f64 = 0.4;

pub const GAZE_FLOOR: f64 = 0.1;
pub const ATTENTION_FLOOR: f64 = 0.2;

/// Half-width of the uniform jitter applied to each final score.
pub const SIGNAL_NOISE: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalReading {
    pub gaze_score: f64,
    pub attention_score: f64,
    pub face_detected: bool,
}

impl SignalReading {
    /// Undecodable frame or no face.
    pub const fn absent() -> Self {
        Self {
            gaze_score: 0.0,
            attention_score: 0.0,
            face_detected: false,
        }
    }

    /// Face found, but not enough eyes to score it.
    pub const fn eyes_missing() -> Self {
        Self {
            gaze_score: 0.0,
            attention_score: 0.0,
            face_detected: true,
        }
    }
}

pub fn base_gaze(eye_to_face_ratio: f64) -> f64 {
    EYE_RATIO_TIERS.lookup(eye_to_face_ratio)
}

/// Scale a base gaze score by eye openness, capped at 1.0.
pub fn modulate_gaze(base: f64, openness: Option<f64>) -> f64 {
    match openness {
        Some(value) => (base * OPENNESS_MODULATION.lookup(value)).min(1.0),
        None => base,
    }
}

pub fn size_score(face_area_ratio: f64) -> f64 {
    FACE_SIZE_TIERS.lookup(face_area_ratio)
}

pub fn attention(centering: f64, face_area_ratio: f64) -> f64 {
    CENTERING_WEIGHT * saturate(centering, 0.0, 1.0) + SIZE_WEIGHT * size_score(face_area_ratio)
}

pub fn score(features: &RawFeatures, noise: &mut dyn NoiseSource) -> SignalReading {
    let gaze = modulate_gaze(base_gaze(features.eye_to_face_ratio), features.openness);
    let gaze = saturate(gaze, GAZE_FLOOR, 1.0);
    let attention = saturate(
        attention(features.centering, features.face_area_ratio),
        ATTENTION_FLOOR,
        1.0,
    );

    let gaze = saturate(gaze + noise.sample(-SIGNAL_NOISE, SIGNAL_NOISE), 0.0, 1.0);
    let attention = saturate(attention + noise.sample(-SIGNAL_NOISE, SIGNAL_NOISE), 0.0, 1.0);

    SignalReading {
        gaze_score: gaze,
        attention_score: attention,
        face_detected: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise::{FixedNoise, SeededNoise, ZeroNoise};

    fn features(openness: Option<f64>) -> RawFeatures {
        RawFeatures {
            eye_to_face_ratio: 0.02,
            openness,
            centering: 1.0,
            face_area_ratio: 0.1,
        }
    }

    #[test]
    fn test_eye_ratio_tiers() {
        assert_eq!(base_gaze(0.01), 0.8);
        assert_eq!(base_gaze(0.05), 0.8);
        assert_eq!(base_gaze(0.007), 0.6);
        assert_eq!(base_gaze(0.08), 0.6);
        assert_eq!(base_gaze(0.004), 0.3);
        assert_eq!(base_gaze(0.2), 0.3);
    }

    #[test]
    fn test_openness_modulation() {
        assert!((modulate_gaze(0.8, Some(0.1)) - 0.24).abs() < 1e-12);
        assert!((modulate_gaze(0.8, Some(0.2)) - 0.48).abs() < 1e-12);
        assert_eq!(modulate_gaze(0.8, Some(0.3)), 0.8);
        assert!((modulate_gaze(0.8, Some(0.5)) - 0.88).abs() < 1e-12);
        assert_eq!(modulate_gaze(0.8, None), 0.8);
    }

    #[test]
    fn test_size_tiers() {
        assert_eq!(size_score(0.1), 1.0);
        assert_eq!(size_score(0.015), 0.7);
        assert_eq!(size_score(0.2), 0.7);
        assert_eq!(size_score(0.005), 0.4);
        assert_eq!(size_score(0.3), 0.4);
    }

    #[test]
    fn test_closed_eyes_pull_gaze_down_but_not_attention() {
        let open = score(&features(Some(0.6)), &mut ZeroNoise);
        let closed = score(&features(Some(0.05)), &mut ZeroNoise);
        assert!((open.gaze_score - 0.88).abs() < 1e-12);
        assert!((closed.gaze_score - 0.24).abs() < 1e-12);
        assert_eq!(open.attention_score, closed.attention_score);
        assert_eq!(open.attention_score, 1.0);
    }

    #[test]
    fn test_floors_apply_before_noise() {
        let poor = RawFeatures {
            eye_to_face_ratio: 0.5,
            openness: Some(0.0),
            centering: 0.0,
            face_area_ratio: 0.9,
        };
        // gaze 0.3 * 0.3 = 0.09 → floor 0.1; attention 0.16 → floor 0.2
        let reading = score(&poor, &mut ZeroNoise);
        assert!((reading.gaze_score - 0.1).abs() < 1e-12);
        assert!((reading.attention_score - 0.2).abs() < 1e-12);

        let nudged = score(&poor, &mut FixedNoise(-1.0));
        assert!((nudged.gaze_score - 0.05).abs() < 1e-12);
        assert!((nudged.attention_score - 0.15).abs() < 1e-12);
    }

    #[test]
    fn test_scores_stay_in_unit_range() {
        let mut noise = SeededNoise::from_seed(11);
        for _ in 0..500 {
            let reading = score(&features(Some(0.9)), &mut noise);
            assert!((0.0..=1.0).contains(&reading.gaze_score));
            assert!((0.0..=1.0).contains(&reading.attention_score));
            assert!(reading.face_detected);
        }
    }
}
