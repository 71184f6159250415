//! Cognitive load estimation and emotional-state classification.
//!
//! Load is derived from gaze quality scaled by how much headroom the learner
//! has (`cognitive_capacity`); the emotional state compares that load against
//! fixed multiples of the same capacity.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::bands::{Band, RangeTable};
use crate::noise::NoiseSource;
use crate::saturate;

/// Load contributed by a gaze score of zero.
pub const BASE_LOAD_SPAN: f64 = 60.0;
pub const LOAD_NOISE: (f64, f64) = (-10.0, 15.0);
pub const MIN_COGNITIVE_LOAD: f64 = 15.0;
pub const MAX_COGNITIVE_LOAD: f64 = 95.0;

/// Load above `capacity * OVERWHELMED_CAPACITY_MULTIPLE` reads as overwhelmed.
/// Independent of the accrual overload threshold.
pub const OVERWHELMED_CAPACITY_MULTIPLE: f64 = 1.2;
pub const STRESSED_CAPACITY_MULTIPLE: f64 = 1.0;
pub const FOCUSED_CAPACITY_MULTIPLE: f64 = 0.6;
pub const RELAXED_CAPACITY_MULTIPLE: f64 = 0.3;

/// Lower capacity amplifies perceived load.
pub const CAPACITY_FACTORS: RangeTable<f64> =
    RangeTable::new(&[(Band::Above(70.0), 0.8), (Band::Above(50.0), 1.0)], 1.2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionalState {
    Overwhelmed,
    Stressed,
    #[default]
    Focused,
    Relaxed,
    Bored,
}

impl EmotionalState {
    pub const ALL: [EmotionalState; 5] = [
        EmotionalState::Overwhelmed,
        EmotionalState::Stressed,
        EmotionalState::Focused,
        EmotionalState::Relaxed,
        EmotionalState::Bored,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionalState::Overwhelmed => "overwhelmed",
            EmotionalState::Stressed => "stressed",
            EmotionalState::Focused => "focused",
            EmotionalState::Relaxed => "relaxed",
            EmotionalState::Bored => "bored",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl fmt::Display for EmotionalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse load bucket shown on dashboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl LoadLevel {
    pub fn from_load(load: f64) -> Self {
        if load < 30.0 {
            LoadLevel::Low
        } else if load < 60.0 {
            LoadLevel::Medium
        } else if load < 80.0 {
            LoadLevel::High
        } else {
            LoadLevel::Critical
        }
    }
}

pub fn capacity_factor(cognitive_capacity: i32) -> f64 {
    CAPACITY_FACTORS.lookup(f64::from(cognitive_capacity))
}

pub fn cognitive_load(gaze_score: f64, cognitive_capacity: i32, noise: &mut dyn NoiseSource) -> f64 {
    let gaze = saturate(gaze_score, 0.0, 1.0);
    let (low, high) = LOAD_NOISE;
    let base = (1.0 - gaze) * BASE_LOAD_SPAN + noise.sample(low, high);
    saturate(
        base * capacity_factor(cognitive_capacity),
        MIN_COGNITIVE_LOAD,
        MAX_COGNITIVE_LOAD,
    )
}

/// Label a load against the learner's capacity. Thresholds are checked from
/// the highest multiple down.
pub fn classify(cognitive_load: f64, cognitive_capacity: i32) -> EmotionalState {
    let capacity = f64::from(cognitive_capacity);
    if cognitive_load > capacity * OVERWHELMED_CAPACITY_MULTIPLE {
        EmotionalState::Overwhelmed
    } else if cognitive_load > capacity * STRESSED_CAPACITY_MULTIPLE {
        EmotionalState::Stressed
    } else if cognitive_load > capacity * FOCUSED_CAPACITY_MULTIPLE {
        EmotionalState::Focused
    } else if cognitive_load > capacity * RELAXED_CAPACITY_MULTIPLE {
        EmotionalState::Relaxed
    } else {
        EmotionalState::Bored
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CognitiveAssessment {
    pub cognitive_load: f64,
    pub emotional_state: EmotionalState,
    pub load_level: LoadLevel,
}

pub fn assess(gaze_score: f64, cognitive_capacity: i32, noise: &mut dyn NoiseSource) -> CognitiveAssessment {
    let load = cognitive_load(gaze_score, cognitive_capacity, noise);
    CognitiveAssessment {
        cognitive_load: load,
        emotional_state: classify(load, cognitive_capacity),
        load_level: LoadLevel::from_load(load),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise::{FixedNoise, ZeroNoise};

    #[test]
    fn test_classify_examples() {
        assert_eq!(classify(90.0, 50), EmotionalState::Overwhelmed);
        assert_eq!(classify(48.0, 70), EmotionalState::Focused);
        assert_eq!(classify(55.0, 50), EmotionalState::Stressed);
        assert_eq!(classify(20.0, 50), EmotionalState::Relaxed);
        assert_eq!(classify(15.0, 50), EmotionalState::Bored);
    }

    #[test]
    fn test_classify_boundaries_are_exclusive() {
        // 60 is exactly capacity * 1.2 → not overwhelmed
        assert_eq!(classify(60.0, 50), EmotionalState::Stressed);
        assert_eq!(classify(50.0, 50), EmotionalState::Focused);
    }

    #[test]
    fn test_capacity_factor() {
        assert_eq!(capacity_factor(80), 0.8);
        assert_eq!(capacity_factor(71), 0.8);
        assert_eq!(capacity_factor(70), 1.0);
        assert_eq!(capacity_factor(51), 1.0);
        assert_eq!(capacity_factor(50), 1.2);
        assert_eq!(capacity_factor(10), 1.2);
    }

    #[test]
    fn test_zero_gaze_base_load() {
        assert_eq!(cognitive_load(0.0, 60, &mut ZeroNoise), 60.0);
        assert!((cognitive_load(0.0, 75, &mut ZeroNoise) - 48.0).abs() < 1e-9);
        assert!((cognitive_load(0.0, 40, &mut ZeroNoise) - 72.0).abs() < 1e-9);
    }

    #[test]
    fn test_load_is_clamped() {
        assert_eq!(cognitive_load(1.0, 60, &mut ZeroNoise), MIN_COGNITIVE_LOAD);
        // worst case: (60 + 15) * 1.2
        let worst = cognitive_load(0.0, 10, &mut FixedNoise(15.0));
        assert!((worst - 90.0).abs() < 1e-9);
        assert!(worst <= MAX_COGNITIVE_LOAD);
        assert_eq!(cognitive_load(f64::NAN, 60, &mut ZeroNoise), 60.0);
    }

    #[test]
    fn test_load_levels() {
        assert_eq!(LoadLevel::from_load(15.0), LoadLevel::Low);
        assert_eq!(LoadLevel::from_load(30.0), LoadLevel::Medium);
        assert_eq!(LoadLevel::from_load(79.9), LoadLevel::High);
        assert_eq!(LoadLevel::from_load(80.0), LoadLevel::Critical);
    }

    #[test]
    fn test_state_text_round_trips() {
        for state in EmotionalState::ALL {
            assert_eq!(EmotionalState::parse(state.as_str()), Some(state));
        }
        assert_eq!(EmotionalState::parse("Focused"), Some(EmotionalState::Focused));
        assert_eq!(EmotionalState::parse("sleepy"), None);
        assert_eq!(
            serde_json::to_string(&EmotionalState::Overwhelmed).unwrap(),
            "\"overwhelmed\""
        );
    }
}
