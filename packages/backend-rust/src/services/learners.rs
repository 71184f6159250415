use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use studysense_signals::LoadLevel;
use tracing::info;

use crate::db::{
    Course, Enrollment, LearnerProfile, LearningStore, LearningTx, StoreError, TelemetryRecord,
    DEFAULT_TELEMETRY_LIMIT, MAX_TELEMETRY_LIMIT,
};
use crate::services::accrual::{mean_progress, AccrualError};
use crate::services::LearnerLocks;

pub const DEFAULT_COGNITIVE_CAPACITY: i32 = 70;
pub const MIN_COGNITIVE_CAPACITY: i32 = 1;
pub const MAX_COGNITIVE_CAPACITY: i32 = 100;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCourse {
    pub title: String,
    pub description: Option<String>,
    pub difficulty: Option<String>,
    pub duration_minutes: Option<i64>,
}

/// A catalogue course as seen by one learner.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgress {
    pub course: Course,
    pub enrolled: bool,
    pub course_progress: f64,
    pub time_spent_minutes: f64,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub profile: LearnerProfile,
    pub progress_percent: f64,
    pub active_course: Option<Course>,
    pub recommended_course: Option<Course>,
    pub latest_telemetry: Option<TelemetryRecord>,
    pub cognitive_load: Option<f64>,
    pub load_level: Option<LoadLevel>,
}

/// Next course after the active one in catalogue order. With nothing active
/// the first course is recommended.
pub fn recommend_next(courses: &[Course], active_course_id: Option<&str>) -> Option<Course> {
    match active_course_id {
        None => courses.first().cloned(),
        Some(active) => courses
            .iter()
            .position(|c| c.course_id == active)
            .and_then(|i| courses.get(i + 1))
            .cloned(),
    }
}

pub fn clamp_telemetry_limit(limit: Option<u32>) -> u32 {
    limit
        .unwrap_or(DEFAULT_TELEMETRY_LIMIT)
        .clamp(1, MAX_TELEMETRY_LIMIT)
}

/// Profile and catalogue management. Anything that changes a learner's
/// enrollments takes the same per-learner lock as the accrual engine.
pub struct LearnerService<S: LearningStore> {
    store: Arc<S>,
    locks: Arc<LearnerLocks>,
}

impl<S: LearningStore> LearnerService<S> {
    pub fn new(store: Arc<S>, locks: Arc<LearnerLocks>) -> Self {
        Self { store, locks }
    }

    pub async fn create_learner(
        &self,
        name: &str,
        cognitive_capacity: i32,
    ) -> Result<LearnerProfile, StoreError> {
        let profile = LearnerProfile::new(name.trim(), cognitive_capacity);
        let mut tx = self.store.begin().await?;
        tx.insert_profile(&profile).await?;
        tx.commit().await?;
        info!(learner_id = %profile.learner_id, cognitive_capacity, "learner created");
        Ok(profile)
    }

    pub async fn list_learners(&self) -> Result<Vec<LearnerProfile>, StoreError> {
        let mut tx = self.store.begin_read().await?;
        tx.list_profiles().await
    }

    pub async fn create_course(&self, input: NewCourse) -> Result<Course, StoreError> {
        let mut course = Course::new(input.title.trim());
        course.description = input.description;
        course.difficulty = input.difficulty;
        course.duration_minutes = input.duration_minutes;

        let mut tx = self.store.begin().await?;
        tx.insert_course(&course).await?;
        tx.commit().await?;
        info!(course_id = %course.course_id, title = %course.title, "course created");
        Ok(course)
    }

    pub async fn list_courses(&self) -> Result<Vec<Course>, StoreError> {
        let mut tx = self.store.begin_read().await?;
        tx.list_courses().await
    }

    pub async fn dashboard(&self, learner_id: &str) -> Result<Dashboard, AccrualError> {
        let mut tx = self.store.begin_read().await?;
        let profile = load_required(&mut tx, learner_id).await?;
        let courses = tx.list_courses().await?;
        let latest_telemetry = tx.recent_telemetry(learner_id, 1).await?.into_iter().next();

        let active_id = profile.active_course_id.as_deref();
        let active_course = active_id.and_then(|id| courses.iter().find(|c| c.course_id == id).cloned());
        let cognitive_load = latest_telemetry.as_ref().map(|t| t.cognitive_load);

        Ok(Dashboard {
            progress_percent: profile.overall_progress * 100.0,
            recommended_course: recommend_next(&courses, active_id),
            active_course,
            load_level: cognitive_load.map(LoadLevel::from_load),
            cognitive_load,
            latest_telemetry,
            profile,
        })
    }

    /// Make `course_id` the learner's active course, enrolling if needed.
    pub async fn start_course(
        &self,
        learner_id: &str,
        course_id: &str,
    ) -> Result<LearnerProfile, AccrualError> {
        let _guard = self.locks.acquire(learner_id).await;
        let mut tx = self.store.begin().await?;
        let mut profile = load_required(&mut tx, learner_id).await?;
        ensure_course(&mut tx, course_id).await?;

        profile.active_course_id = Some(course_id.to_string());
        enroll(&mut tx, &mut profile, course_id).await?;
        tx.commit().await?;

        info!(learner_id, course_id, "course started");
        Ok(profile)
    }

    /// Adjust capacity and optionally reassign the active course.
    pub async fn set_limits(
        &self,
        learner_id: &str,
        cognitive_capacity: i32,
        assigned_course_id: Option<&str>,
    ) -> Result<LearnerProfile, AccrualError> {
        let _guard = self.locks.acquire(learner_id).await;
        let mut tx = self.store.begin().await?;
        let mut profile = load_required(&mut tx, learner_id).await?;
        profile.cognitive_capacity = cognitive_capacity;

        match assigned_course_id {
            Some(course_id) => {
                ensure_course(&mut tx, course_id).await?;
                profile.active_course_id = Some(course_id.to_string());
                enroll(&mut tx, &mut profile, course_id).await?;
            }
            None => {
                profile.updated_at = Utc::now();
                tx.update_profile(&profile).await?;
            }
        }
        tx.commit().await?;

        info!(learner_id, cognitive_capacity, "limits updated");
        Ok(profile)
    }

    pub async fn learner_courses(&self, learner_id: &str) -> Result<Vec<CourseProgress>, AccrualError> {
        let mut tx = self.store.begin_read().await?;
        let profile = load_required(&mut tx, learner_id).await?;
        let courses = tx.list_courses().await?;
        let enrollments = tx.list_enrollments(learner_id).await?;

        Ok(courses
            .into_iter()
            .map(|course| {
                let enrollment = enrollments.iter().find(|e| e.course_id == course.course_id);
                CourseProgress {
                    is_active: profile.active_course_id.as_deref() == Some(course.course_id.as_str()),
                    enrolled: enrollment.is_some(),
                    course_progress: enrollment.map_or(0.0, |e| e.course_progress),
                    time_spent_minutes: enrollment.map_or(0.0, |e| e.time_spent_minutes),
                    course,
                }
            })
            .collect())
    }

    /// Progress on one course. Reading it enrolls the learner.
    pub async fn course_progress(
        &self,
        learner_id: &str,
        course_id: &str,
    ) -> Result<Enrollment, AccrualError> {
        let _guard = self.locks.acquire(learner_id).await;
        let mut tx = self.store.begin().await?;
        let mut profile = load_required(&mut tx, learner_id).await?;
        ensure_course(&mut tx, course_id).await?;
        let enrollment = enroll(&mut tx, &mut profile, course_id).await?;
        tx.commit().await?;
        Ok(enrollment)
    }

    pub async fn telemetry(
        &self,
        learner_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<TelemetryRecord>, AccrualError> {
        let mut tx = self.store.begin_read().await?;
        load_required(&mut tx, learner_id).await?;
        Ok(tx
            .recent_telemetry(learner_id, clamp_telemetry_limit(limit))
            .await?)
    }
}

async fn load_required<T: LearningTx>(tx: &mut T, learner_id: &str) -> Result<LearnerProfile, AccrualError> {
    tx.load_profile(learner_id)
        .await?
        .ok_or_else(|| AccrualError::NotFound(learner_id.to_string()))
}

async fn ensure_course<T: LearningTx>(tx: &mut T, course_id: &str) -> Result<(), AccrualError> {
    if tx.course_exists(course_id).await? {
        Ok(())
    } else {
        Err(StoreError::NotFound(format!("course {course_id}")).into())
    }
}

/// Get or create the enrollment and write the profile back with overall
/// progress recomputed over all enrollments.
async fn enroll<T: LearningTx>(
    tx: &mut T,
    profile: &mut LearnerProfile,
    course_id: &str,
) -> Result<Enrollment, StoreError> {
    let enrollment = tx
        .get_or_create_enrollment(&profile.learner_id, course_id)
        .await?;
    let enrollments = tx.list_enrollments(&profile.learner_id).await?;
    profile.overall_progress = mean_progress(&enrollments);
    profile.updated_at = Utc::now();
    tx.update_profile(profile).await?;
    Ok(enrollment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryLearningStore;

    fn service() -> LearnerService<MemoryLearningStore> {
        LearnerService::new(Arc::new(MemoryLearningStore::new()), Arc::new(LearnerLocks::new()))
    }

    async fn catalogue(service: &LearnerService<MemoryLearningStore>) -> Vec<Course> {
        let mut courses = Vec::new();
        for title in ["One", "Two", "Three"] {
            let course = service
                .create_course(NewCourse {
                    title: title.into(),
                    ..Default::default()
                })
                .await
                .unwrap();
            courses.push(course);
        }
        courses
    }

    #[test]
    fn test_recommend_next() {
        let courses: Vec<Course> = ["a", "b"].into_iter().map(Course::new).collect();
        assert_eq!(recommend_next(&courses, None), Some(courses[0].clone()));
        assert_eq!(
            recommend_next(&courses, Some(&courses[0].course_id)),
            Some(courses[1].clone())
        );
        assert_eq!(recommend_next(&courses, Some(&courses[1].course_id)), None);
        assert_eq!(recommend_next(&[], None), None);
    }

    #[test]
    fn test_telemetry_limit_is_clamped() {
        assert_eq!(clamp_telemetry_limit(None), DEFAULT_TELEMETRY_LIMIT);
        assert_eq!(clamp_telemetry_limit(Some(0)), 1);
        assert_eq!(clamp_telemetry_limit(Some(10_000)), MAX_TELEMETRY_LIMIT);
    }

    #[tokio::test]
    async fn test_start_course_enrolls_and_activates() {
        let service = service();
        let courses = catalogue(&service).await;
        let learner = service.create_learner("  Lin ", 60).await.unwrap();
        assert_eq!(learner.name, "Lin");

        let profile = service
            .start_course(&learner.learner_id, &courses[1].course_id)
            .await
            .unwrap();
        assert_eq!(profile.active_course_id.as_deref(), Some(courses[1].course_id.as_str()));

        let listing = service.learner_courses(&learner.learner_id).await.unwrap();
        assert_eq!(listing.len(), 3);
        assert!(listing[1].enrolled && listing[1].is_active);
        assert!(!listing[0].enrolled && !listing[2].is_active);

        let dashboard = service.dashboard(&learner.learner_id).await.unwrap();
        assert_eq!(dashboard.active_course.map(|c| c.course_id), Some(courses[1].course_id.clone()));
        assert_eq!(dashboard.recommended_course.map(|c| c.course_id), Some(courses[2].course_id.clone()));
        assert!(dashboard.latest_telemetry.is_none());
        assert_eq!(dashboard.load_level, None);
    }

    #[tokio::test]
    async fn test_unknown_course_is_not_found() {
        let service = service();
        let learner = service.create_learner("Lin", 60).await.unwrap();
        let err = service
            .start_course(&learner.learner_id, "missing")
            .await
            .unwrap_err();
        assert!(matches!(err, AccrualError::Store(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_set_limits_without_course_keeps_active() {
        let service = service();
        let courses = catalogue(&service).await;
        let learner = service.create_learner("Lin", 60).await.unwrap();
        service
            .start_course(&learner.learner_id, &courses[0].course_id)
            .await
            .unwrap();

        let profile = service.set_limits(&learner.learner_id, 85, None).await.unwrap();
        assert_eq!(profile.cognitive_capacity, 85);
        assert_eq!(profile.active_course_id.as_deref(), Some(courses[0].course_id.as_str()));

        let profile = service
            .set_limits(&learner.learner_id, 40, Some(&courses[2].course_id))
            .await
            .unwrap();
        assert_eq!(profile.active_course_id.as_deref(), Some(courses[2].course_id.as_str()));
    }

    #[tokio::test]
    async fn test_course_progress_creates_enrollment_once() {
        let service = service();
        let courses = catalogue(&service).await;
        let learner = service.create_learner("Lin", 60).await.unwrap();

        let first = service
            .course_progress(&learner.learner_id, &courses[0].course_id)
            .await
            .unwrap();
        let again = service
            .course_progress(&learner.learner_id, &courses[0].course_id)
            .await
            .unwrap();
        assert_eq!(first.started_at, again.started_at);
        assert_eq!(again.course_progress, 0.0);

        let telemetry = service.telemetry(&learner.learner_id, None).await.unwrap();
        assert!(telemetry.is_empty());
        assert!(matches!(
            service.telemetry("nobody", None).await,
            Err(AccrualError::NotFound(_))
        ));
    }
}
