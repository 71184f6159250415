//! Transactional progress accrual for one observation.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use studysense_signals::{
    advance_progress, assess, engagement_score, progress_increment, AccrualInput, EmotionalState,
    LoadLevel, SignalReading,
};
use tracing::debug;
use uuid::Uuid;

use crate::db::{Enrollment, LearningStore, LearningTx, StoreError, TelemetryRecord};
use crate::services::{LearnerLocks, NoiseHandle};

#[derive(Debug, thiserror::Error)]
pub enum AccrualError {
    #[error("learner {0} not found")]
    NotFound(String),
    #[error("learner {0} has no active course")]
    InvalidState(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccrualOutcome {
    pub learner_id: String,
    pub course_id: String,
    pub gaze_score: f64,
    pub attention_score: f64,
    pub face_detected: bool,
    pub cognitive_load: f64,
    pub emotional_state: EmotionalState,
    pub load_level: LoadLevel,
    pub engagement: f64,
    pub progress_increment: f64,
    pub new_course_progress: f64,
    pub time_spent_minutes: f64,
    pub overall_progress: f64,
    pub telemetry_id: String,
}

/// Mean course progress; zero with no enrollments.
pub fn mean_progress(enrollments: &[Enrollment]) -> f64 {
    if enrollments.is_empty() {
        return 0.0;
    }
    enrollments.iter().map(|e| e.course_progress).sum::<f64>() / enrollments.len() as f64
}

fn sanitize_minutes(elapsed_minutes: f64) -> f64 {
    if elapsed_minutes.is_finite() {
        elapsed_minutes.max(0.0)
    } else {
        0.0
    }
}

/// Applies observations to enrollments, profiles and telemetry.
///
/// Every call runs in a single store transaction while holding the learner's
/// lock, so concurrent observations for one learner never lose an update and
/// observations for different learners proceed independently.
pub struct ProgressAccrualEngine<S: LearningStore> {
    store: Arc<S>,
    locks: Arc<LearnerLocks>,
    noise: NoiseHandle,
}

impl<S: LearningStore> ProgressAccrualEngine<S> {
    pub fn new(store: Arc<S>, locks: Arc<LearnerLocks>, noise: NoiseHandle) -> Self {
        Self { store, locks, noise }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub async fn apply(
        &self,
        learner_id: &str,
        elapsed_minutes: f64,
        reading: SignalReading,
    ) -> Result<AccrualOutcome, AccrualError> {
        let _guard = self.locks.acquire(learner_id).await;
        let mut tx = self.store.begin().await?;

        let mut profile = tx
            .load_profile(learner_id)
            .await?
            .ok_or_else(|| AccrualError::NotFound(learner_id.to_string()))?;
        let course_id = profile
            .active_course_id
            .clone()
            .ok_or_else(|| AccrualError::InvalidState(learner_id.to_string()))?;
        if !tx.course_exists(&course_id).await? {
            return Err(StoreError::NotFound(format!("course {course_id}")).into());
        }

        let capacity = profile.cognitive_capacity;
        let (assessment, engagement) = self.noise.with(|noise| {
            let assessment = assess(reading.gaze_score, capacity, noise);
            let engagement = engagement_score(reading.attention_score, noise);
            (assessment, engagement)
        });

        let minutes = sanitize_minutes(elapsed_minutes);
        let increment = progress_increment(AccrualInput {
            elapsed_minutes: minutes,
            cognitive_load: assessment.cognitive_load,
            engagement,
            cognitive_capacity: capacity,
        });

        let now = Utc::now();
        let mut enrollment = tx.get_or_create_enrollment(learner_id, &course_id).await?;
        enrollment.course_progress = advance_progress(enrollment.course_progress, increment);
        enrollment.time_spent_minutes += minutes;
        enrollment.updated_at = now;
        tx.update_enrollment(&enrollment).await?;

        let enrollments = tx.list_enrollments(learner_id).await?;
        profile.overall_progress = mean_progress(&enrollments);
        profile.emotional_state = assessment.emotional_state;
        profile.updated_at = now;
        tx.update_profile(&profile).await?;

        let record = TelemetryRecord {
            id: Uuid::new_v4().to_string(),
            learner_id: learner_id.to_string(),
            course_id: course_id.clone(),
            recorded_at: now,
            gaze_score: reading.gaze_score,
            attention_score: reading.attention_score,
            cognitive_load: assessment.cognitive_load,
            emotional_state: assessment.emotional_state,
            engagement,
            elapsed_minutes: minutes,
            progress_snapshot: enrollment.course_progress,
        };
        tx.append_telemetry(&record).await?;
        tx.commit().await?;

        debug!(
            learner_id,
            course_id = %course_id,
            gaze = reading.gaze_score,
            attention = reading.attention_score,
            load = assessment.cognitive_load,
            state = %assessment.emotional_state,
            engagement,
            progress = enrollment.course_progress,
            "observation applied"
        );

        Ok(AccrualOutcome {
            learner_id: learner_id.to_string(),
            course_id,
            gaze_score: reading.gaze_score,
            attention_score: reading.attention_score,
            face_detected: reading.face_detected,
            cognitive_load: assessment.cognitive_load,
            emotional_state: assessment.emotional_state,
            load_level: assessment.load_level,
            engagement,
            progress_increment: increment,
            new_course_progress: enrollment.course_progress,
            time_spent_minutes: enrollment.time_spent_minutes,
            overall_progress: profile.overall_progress,
            telemetry_id: record.id,
        })
    }
}
