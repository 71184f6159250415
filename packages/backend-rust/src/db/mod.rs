//! Persistence for learner profiles, courses, enrollments and telemetry.
//!
//! All access goes through a [`LearningTx`] obtained from a [`LearningStore`].
//! A transaction that is dropped without [`LearningTx::commit`] is rolled
//! back, so a failed accrual never leaves partial writes behind.

pub mod memory;
pub mod schema;
pub mod sqlite;

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use studysense_signals::EmotionalState;
use uuid::Uuid;

pub use memory::MemoryLearningStore;
pub use sqlite::{SqliteLearningStore, StoreInitError};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerProfile {
    pub learner_id: String,
    pub name: String,
    pub cognitive_capacity: i32,
    pub active_course_id: Option<String>,
    pub overall_progress: f64,
    pub emotional_state: EmotionalState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LearnerProfile {
    pub fn new(name: impl Into<String>, cognitive_capacity: i32) -> Self {
        let now = Utc::now();
        Self {
            learner_id: Uuid::new_v4().to_string(),
            name: name.into(),
            cognitive_capacity,
            active_course_id: None,
            overall_progress: 0.0,
            emotional_state: EmotionalState::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub course_id: String,
    pub title: String,
    pub description: Option<String>,
    pub difficulty: Option<String>,
    pub duration_minutes: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Course {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            course_id: Uuid::new_v4().to_string(),
            title: title.into(),
            description: None,
            difficulty: None,
            duration_minutes: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub learner_id: String,
    pub course_id: String,
    pub course_progress: f64,
    pub time_spent_minutes: f64,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Enrollment {
    pub fn new(learner_id: impl Into<String>, course_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            learner_id: learner_id.into(),
            course_id: course_id.into(),
            course_progress: 0.0,
            time_spent_minutes: 0.0,
            started_at: now,
            updated_at: now,
        }
    }
}

/// One observation as it was scored and applied. Never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryRecord {
    pub id: String,
    pub learner_id: String,
    pub course_id: String,
    pub recorded_at: DateTime<Utc>,
    pub gaze_score: f64,
    pub attention_score: f64,
    pub cognitive_load: f64,
    pub emotional_state: EmotionalState,
    pub engagement: f64,
    pub elapsed_minutes: f64,
    pub progress_snapshot: f64,
}

pub const DEFAULT_TELEMETRY_LIMIT: u32 = 50;
pub const MAX_TELEMETRY_LIMIT: u32 = 500;

pub trait LearningStore: Send + Sync + 'static {
    type Tx: LearningTx;

    /// Start a transaction that will write. Implementations take whatever
    /// write lock they need before returning.
    fn begin(&self) -> impl Future<Output = Result<Self::Tx, StoreError>> + Send;

    fn begin_read(&self) -> impl Future<Output = Result<Self::Tx, StoreError>> + Send;
}

pub trait LearningTx: Send {
    fn load_profile(
        &mut self,
        learner_id: &str,
    ) -> impl Future<Output = Result<Option<LearnerProfile>, StoreError>> + Send;

    fn list_profiles(&mut self) -> impl Future<Output = Result<Vec<LearnerProfile>, StoreError>> + Send;

    fn insert_profile(
        &mut self,
        profile: &LearnerProfile,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Fails with [`StoreError::NotFound`] when the learner does not exist.
    fn update_profile(
        &mut self,
        profile: &LearnerProfile,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn course_exists(&mut self, course_id: &str) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Courses in catalogue (insertion) order.
    fn list_courses(&mut self) -> impl Future<Output = Result<Vec<Course>, StoreError>> + Send;

    fn insert_course(&mut self, course: &Course) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn get_or_create_enrollment(
        &mut self,
        learner_id: &str,
        course_id: &str,
    ) -> impl Future<Output = Result<Enrollment, StoreError>> + Send;

    fn update_enrollment(
        &mut self,
        enrollment: &Enrollment,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn list_enrollments(
        &mut self,
        learner_id: &str,
    ) -> impl Future<Output = Result<Vec<Enrollment>, StoreError>> + Send;

    fn append_telemetry(
        &mut self,
        record: &TelemetryRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Newest first.
    fn recent_telemetry(
        &mut self,
        learner_id: &str,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<TelemetryRecord>, StoreError>> + Send;

    fn commit(self) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// The store selected at start-up.
pub enum LearningBackend {
    Sqlite(SqliteLearningStore),
    Memory(MemoryLearningStore),
}

pub enum BackendTx {
    Sqlite(sqlite::SqliteTx),
    Memory(memory::MemoryTx),
}

impl LearningBackend {
    pub fn kind(&self) -> &'static str {
        match self {
            LearningBackend::Sqlite(_) => "sqlite",
            LearningBackend::Memory(_) => "memory",
        }
    }

    pub async fn ping(&self) -> bool {
        match self {
            LearningBackend::Sqlite(store) => store.ping().await,
            LearningBackend::Memory(_) => true,
        }
    }
}

impl LearningStore for LearningBackend {
    type Tx = BackendTx;

    async fn begin(&self) -> Result<BackendTx, StoreError> {
        Ok(match self {
            LearningBackend::Sqlite(store) => BackendTx::Sqlite(store.begin().await?),
            LearningBackend::Memory(store) => BackendTx::Memory(store.begin().await?),
        })
    }

    async fn begin_read(&self) -> Result<BackendTx, StoreError> {
        Ok(match self {
            LearningBackend::Sqlite(store) => BackendTx::Sqlite(store.begin_read().await?),
            LearningBackend::Memory(store) => BackendTx::Memory(store.begin_read().await?),
        })
    }
}

macro_rules! dispatch {
    ($self:ident, $tx:ident => $call:expr) => {
        match $self {
            BackendTx::Sqlite($tx) => $call.await,
            BackendTx::Memory($tx) => $call.await,
        }
    };
}

impl LearningTx for BackendTx {
    async fn load_profile(&mut self, learner_id: &str) -> Result<Option<LearnerProfile>, StoreError> {
        dispatch!(self, tx => tx.load_profile(learner_id))
    }

    async fn list_profiles(&mut self) -> Result<Vec<LearnerProfile>, StoreError> {
        dispatch!(self, tx => tx.list_profiles())
    }

    async fn insert_profile(&mut self, profile: &LearnerProfile) -> Result<(), StoreError> {
        dispatch!(self, tx => tx.insert_profile(profile))
    }

    async fn update_profile(&mut self, profile: &LearnerProfile) -> Result<(), StoreError> {
        dispatch!(self, tx => tx.update_profile(profile))
    }

    async fn course_exists(&mut self, course_id: &str) -> Result<bool, StoreError> {
        dispatch!(self, tx => tx.course_exists(course_id))
    }

    async fn list_courses(&mut self) -> Result<Vec<Course>, StoreError> {
        dispatch!(self, tx => tx.list_courses())
    }

    async fn insert_course(&mut self, course: &Course) -> Result<(), StoreError> {
        dispatch!(self, tx => tx.insert_course(course))
    }

    async fn get_or_create_enrollment(
        &mut self,
        learner_id: &str,
        course_id: &str,
    ) -> Result<Enrollment, StoreError> {
        dispatch!(self, tx => tx.get_or_create_enrollment(learner_id, course_id))
    }

    async fn update_enrollment(&mut self, enrollment: &Enrollment) -> Result<(), StoreError> {
        dispatch!(self, tx => tx.update_enrollment(enrollment))
    }

    async fn list_enrollments(&mut self, learner_id: &str) -> Result<Vec<Enrollment>, StoreError> {
        dispatch!(self, tx => tx.list_enrollments(learner_id))
    }

    async fn append_telemetry(&mut self, record: &TelemetryRecord) -> Result<(), StoreError> {
        dispatch!(self, tx => tx.append_telemetry(record))
    }

    async fn recent_telemetry(
        &mut self,
        learner_id: &str,
        limit: u32,
    ) -> Result<Vec<TelemetryRecord>, StoreError> {
        dispatch!(self, tx => tx.recent_telemetry(learner_id, limit))
    }

    async fn commit(self) -> Result<(), StoreError> {
        dispatch!(self, tx => tx.commit())
    }
}
