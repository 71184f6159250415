//! Learning-state signals derived from a single camera frame.
//!
//! The pipeline is pure and synchronous:
//! frame → [`features`] → [`scorer`] → {[`cognitive`], [`engagement`]} → [`accrual`].
//! Every random term is drawn from an injected [`NoiseSource`], so results are
//! reproducible when a seeded or pinned source is supplied.

pub mod accrual;
pub mod bands;
pub mod cognitive;
pub mod detect;
pub mod engagement;
pub mod extractor;
pub mod features;
pub mod frame;
pub mod noise;
pub mod openness;
pub mod scorer;

pub use accrual::{advance_progress, progress_increment, AccrualInput};
pub use bands::{Band, RangeTable};
pub use cognitive::{assess, CognitiveAssessment, EmotionalState, LoadLevel};
pub use detect::{largest_face, BoundingBox, FaceDetector, SkinToneDetector};
pub use engagement::engagement_score;
pub use extractor::{score_extraction, SignalExtractor};
pub use features::{FaceObservation, FeatureExtraction, FeatureExtractor, RawFeatures};
pub use frame::{Frame, FrameError};
pub use noise::{FixedNoise, NoiseSource, SeededNoise, ZeroNoise};
pub use scorer::SignalReading;

/// Clamp into `[low, high]`, mapping NaN to `low`.
#[inline]
pub(crate) fn saturate(value: f64, low: f64, high: f64) -> f64 {
    if value.is_nan() {
        low
    } else {
        value.clamp(low, high)
    }
}
