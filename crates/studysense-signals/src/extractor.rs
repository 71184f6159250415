use rayon::prelude::*;
use tracing::debug;

use crate::detect::{FaceDetector, SkinToneDetector};
use crate::features::{FeatureExtraction, FeatureExtractor};
use crate::frame::Frame;
use crate::noise::{NoiseSource, SeededNoise};
use crate::scorer::{self, SignalReading};

/// Frame → [`SignalReading`]: feature extraction followed by scoring.
///
/// Stateless apart from the detector; share one instance across threads.
pub struct SignalExtractor<D = SkinToneDetector> {
    features: FeatureExtractor<D>,
}

impl Default for SignalExtractor<SkinToneDetector> {
    fn default() -> Self {
        Self::new(SkinToneDetector::default())
    }
}

impl<D: FaceDetector> SignalExtractor<D> {
    pub fn new(detector: D) -> Self {
        Self {
            features: FeatureExtractor::new(detector),
        }
    }

    pub fn features(&self) -> &FeatureExtractor<D> {
        &self.features
    }

    pub fn extract(&self, frame: &Frame, noise: &mut dyn NoiseSource) -> SignalReading {
        score_extraction(&self.features.extract(frame), noise)
    }

    /// Decode and score a base64 / data-URL payload. A missing or undecodable
    /// payload yields [`SignalReading::absent`].
    pub fn extract_encoded(&self, payload: Option<&str>, noise: &mut dyn NoiseSource) -> SignalReading {
        let Some(payload) = payload else {
            return SignalReading::absent();
        };
        match Frame::from_data_url(payload) {
            Ok(frame) => self.extract(&frame, noise),
            Err(err) => {
                debug!(error = %err, "frame rejected");
                SignalReading::absent()
            }
        }
    }

    /// Score many frames in parallel. Frame `i` draws from a stream seeded
    /// with `seed + i`, so the output does not depend on scheduling.
    pub fn extract_batch(&self, frames: &[Frame], seed: u64) -> Vec<SignalReading> {
        frames
            .par_iter()
            .enumerate()
            .map(|(i, frame)| {
                let mut noise = SeededNoise::from_seed(seed.wrapping_add(i as u64));
                self.extract(frame, &mut noise)
            })
            .collect()
    }
}

/// Second half of [`SignalExtractor::extract`], and the only step that draws noise.
pub fn score_extraction(extraction: &FeatureExtraction, noise: &mut dyn NoiseSource) -> SignalReading {
    match extraction {
        FeatureExtraction::NoFace => SignalReading::absent(),
        FeatureExtraction::EyesMissing(observation) => {
            debug!(eyes = observation.eyes.len(), "face without enough eyes");
            SignalReading::eyes_missing()
        }
        FeatureExtraction::Features(_, raw) => scorer::score(raw, noise),
    }
}
