use std::sync::Arc;

use studysense_backend::db::schema::SCHEMA_VERSION;
use studysense_backend::db::{
    Course, LearnerProfile, LearningStore, LearningTx, SqliteLearningStore,
};
use studysense_backend::services::accrual::ProgressAccrualEngine;
use studysense_backend::services::learners::LearnerService;
use studysense_backend::services::{LearnerLocks, NoiseHandle};
use studysense_signals::{EmotionalState, SignalReading, ZeroNoise};
use tempfile::TempDir;

async fn open(dir: &TempDir) -> SqliteLearningStore {
    SqliteLearningStore::open(&dir.path().join("nested").join("studysense.db"))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_schema_version_is_recorded() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir).await;

    assert!(store.ping().await);
    assert_eq!(store.schema_version().await.unwrap().as_deref(), Some(SCHEMA_VERSION));
}

#[tokio::test]
async fn test_uncommitted_transaction_rolls_back() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir).await;
    let profile = LearnerProfile::new("Ada", 60);

    {
        let mut tx = store.begin().await.unwrap();
        tx.insert_profile(&profile).await.unwrap();
        assert!(tx.load_profile(&profile.learner_id).await.unwrap().is_some());
    }

    let mut tx = store.begin_read().await.unwrap();
    assert!(tx.load_profile(&profile.learner_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_round_trips_rows() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir).await;

    let mut course = Course::new("Optics");
    course.description = Some("light and lenses".into());
    course.duration_minutes = Some(90);
    let mut profile = LearnerProfile::new("Ada", 60);
    profile.active_course_id = Some(course.course_id.clone());
    profile.emotional_state = EmotionalState::Stressed;

    let mut tx = store.begin().await.unwrap();
    tx.insert_course(&course).await.unwrap();
    tx.insert_profile(&profile).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin_read().await.unwrap();
    let loaded = tx.load_profile(&profile.learner_id).await.unwrap().unwrap();
    assert_eq!(loaded.name, "Ada");
    assert_eq!(loaded.emotional_state, EmotionalState::Stressed);
    assert_eq!(loaded.active_course_id, profile.active_course_id);
    let courses = tx.list_courses().await.unwrap();
    assert_eq!(courses.len(), 1);
    assert_eq!(courses[0].description.as_deref(), Some("light and lenses"));
    assert_eq!(courses[0].duration_minutes, Some(90));
}

#[tokio::test]
async fn test_update_of_missing_profile_is_not_found() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir).await;

    let mut tx = store.begin().await.unwrap();
    let err = tx
        .update_profile(&LearnerProfile::new("ghost", 50))
        .await
        .unwrap_err();
    assert!(matches!(err, studysense_backend::db::StoreError::NotFound(_)));
}

#[tokio::test]
async fn test_progress_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let learner_id;
    {
        let store = Arc::new(open(&dir).await);
        let locks = Arc::new(LearnerLocks::new());
        let learners = LearnerService::new(Arc::clone(&store), Arc::clone(&locks));
        let course = learners
            .create_course(studysense_backend::services::learners::NewCourse {
                title: "Optics".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let profile = learners.create_learner("Ada", 60).await.unwrap();
        learners
            .start_course(&profile.learner_id, &course.course_id)
            .await
            .unwrap();

        let engine = ProgressAccrualEngine::new(Arc::clone(&store), locks, NoiseHandle::new(ZeroNoise));
        for _ in 0..3 {
            engine
                .apply(&profile.learner_id, 5.0, SignalReading::absent())
                .await
                .unwrap();
        }
        learner_id = profile.learner_id;
    }

    let store = open(&dir).await;
    let mut tx = store.begin_read().await.unwrap();
    let enrollments = tx.list_enrollments(&learner_id).await.unwrap();
    assert_eq!(enrollments.len(), 1);
    assert_eq!(enrollments[0].time_spent_minutes, 15.0);
    assert!((enrollments[0].course_progress - 0.072).abs() < 1e-9);

    let profile = tx.load_profile(&learner_id).await.unwrap().unwrap();
    assert!((profile.overall_progress - enrollments[0].course_progress).abs() < 1e-12);

    let telemetry = tx.recent_telemetry(&learner_id, 2).await.unwrap();
    assert_eq!(telemetry.len(), 2);
    assert!(telemetry[0].progress_snapshot > telemetry[1].progress_snapshot);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_writers_for_different_learners_queue_without_failing() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(open(&dir).await);
    let locks = Arc::new(LearnerLocks::new());
    let learners = LearnerService::new(Arc::clone(&store), Arc::clone(&locks));
    let course = learners
        .create_course(studysense_backend::services::learners::NewCourse {
            title: "Optics".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    let mut ids = Vec::new();
    for name in ["Ada", "Grace", "Edsger"] {
        let profile = learners.create_learner(name, 60).await.unwrap();
        learners
            .start_course(&profile.learner_id, &course.course_id)
            .await
            .unwrap();
        ids.push(profile.learner_id);
    }

    // per-learner locks never overlap here, so only the database lock orders them
    let engine = Arc::new(ProgressAccrualEngine::new(
        Arc::clone(&store),
        locks,
        NoiseHandle::new(ZeroNoise),
    ));
    let mut tasks = Vec::new();
    for i in 0..24 {
        let engine = Arc::clone(&engine);
        let learner = ids[i % ids.len()].clone();
        tasks.push(tokio::spawn(async move {
            engine.apply(&learner, 1.0, SignalReading::absent()).await
        }));
    }
    for task in tasks {
        assert!(task.await.unwrap().is_ok());
    }

    let mut tx = store.begin_read().await.unwrap();
    for learner in &ids {
        let enrollments = tx.list_enrollments(learner).await.unwrap();
        assert_eq!(enrollments[0].time_spent_minutes, 8.0);
        assert_eq!(tx.recent_telemetry(learner, 100).await.unwrap().len(), 8);
    }
}
