use std::sync::Arc;

use serde::Serialize;
use studysense_signals::{
    assess, engagement_score, score_extraction, EmotionalState, FeatureExtraction, Frame, LoadLevel,
    SignalExtractor, SignalReading,
};
use tracing::{debug, warn};

use crate::db::{LearningStore, LearningTx};
use crate::services::accrual::{AccrualError, AccrualOutcome, ProgressAccrualEngine};
use crate::services::NoiseHandle;

/// Scores computed for a learner without touching their progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationPreview {
    pub learner_id: String,
    pub gaze_score: f64,
    pub attention_score: f64,
    pub face_detected: bool,
    pub cognitive_load: f64,
    pub emotional_state: EmotionalState,
    pub load_level: LoadLevel,
    pub engagement: f64,
}

pub struct ObservationService<S: LearningStore> {
    extractor: Arc<SignalExtractor>,
    engine: Arc<ProgressAccrualEngine<S>>,
    noise: NoiseHandle,
}

impl<S: LearningStore> ObservationService<S> {
    pub fn new(
        extractor: Arc<SignalExtractor>,
        engine: Arc<ProgressAccrualEngine<S>>,
        noise: NoiseHandle,
    ) -> Self {
        Self {
            extractor,
            engine,
            noise,
        }
    }

    /// Full pipeline: extract, score, then accrue under the learner's lock.
    /// Extraction runs before the lock is taken.
    pub async fn ingest_observation(
        &self,
        learner_id: &str,
        elapsed_minutes: f64,
        frame: Option<String>,
    ) -> Result<AccrualOutcome, AccrualError> {
        let reading = self.extract_signals(frame).await;
        self.engine.apply(learner_id, elapsed_minutes, reading).await
    }

    /// Extraction and scoring only. Missing or undecodable frames give the
    /// absent reading.
    pub async fn extract_signals(&self, frame: Option<String>) -> SignalReading {
        match self.extract_features(frame).await {
            Some(extraction) => self.noise.with(|noise| score_extraction(&extraction, noise)),
            None => SignalReading::absent(),
        }
    }

    pub async fn preview(
        &self,
        learner_id: &str,
        frame: Option<String>,
    ) -> Result<ObservationPreview, AccrualError> {
        let profile = {
            let mut tx = self.engine.store().begin_read().await?;
            tx.load_profile(learner_id)
                .await?
                .ok_or_else(|| AccrualError::NotFound(learner_id.to_string()))?
        };

        let reading = self.extract_signals(frame).await;
        let (assessment, engagement) = self.noise.with(|noise| {
            let assessment = assess(reading.gaze_score, profile.cognitive_capacity, noise);
            (assessment, engagement_score(reading.attention_score, noise))
        });

        Ok(ObservationPreview {
            learner_id: profile.learner_id,
            gaze_score: reading.gaze_score,
            attention_score: reading.attention_score,
            face_detected: reading.face_detected,
            cognitive_load: assessment.cognitive_load,
            emotional_state: assessment.emotional_state,
            load_level: assessment.load_level,
            engagement,
        })
    }

    /// Decode and locate features on the blocking pool. `None` when there is
    /// no usable frame.
    async fn extract_features(&self, frame: Option<String>) -> Option<FeatureExtraction> {
        let payload = frame.filter(|p| !p.trim().is_empty())?;
        let extractor = Arc::clone(&self.extractor);
        let result = tokio::task::spawn_blocking(move || {
            Frame::from_data_url(&payload).map(|frame| extractor.features().extract(&frame))
        })
        .await;

        match result {
            Ok(Ok(extraction)) => Some(extraction),
            Ok(Err(err)) => {
                debug!(error = %err, "frame rejected");
                None
            }
            Err(err) => {
                warn!(error = %err, "feature extraction task failed");
                None
            }
        }
    }
}
