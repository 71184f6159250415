use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{
    Course, Enrollment, LearnerProfile, LearningStore, LearningTx, StoreError, TelemetryRecord,
};

type EnrollmentKey = (String, String);

#[derive(Debug, Default)]
struct Tables {
    profiles: HashMap<String, LearnerProfile>,
    profile_order: Vec<String>,
    courses: Vec<Course>,
    enrollments: HashMap<EnrollmentKey, Enrollment>,
    enrollment_order: Vec<EnrollmentKey>,
    telemetry: Vec<TelemetryRecord>,
}

/// Process-local store. Each transaction stages its writes and applies them
/// under one write lock on commit.
#[derive(Debug, Clone, Default)]
pub struct MemoryLearningStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryLearningStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn telemetry_count(&self) -> usize {
        self.tables.read().telemetry.len()
    }
}

impl LearningStore for MemoryLearningStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, StoreError> {
        Ok(MemoryTx::new(Arc::clone(&self.tables)))
    }

    async fn begin_read(&self) -> Result<MemoryTx, StoreError> {
        Ok(MemoryTx::new(Arc::clone(&self.tables)))
    }
}

pub struct MemoryTx {
    tables: Arc<RwLock<Tables>>,
    profiles: HashMap<String, LearnerProfile>,
    new_profiles: Vec<String>,
    courses: Vec<Course>,
    enrollments: HashMap<EnrollmentKey, Enrollment>,
    new_enrollments: Vec<EnrollmentKey>,
    telemetry: Vec<TelemetryRecord>,
}

impl MemoryTx {
    fn new(tables: Arc<RwLock<Tables>>) -> Self {
        Self {
            tables,
            profiles: HashMap::new(),
            new_profiles: Vec::new(),
            courses: Vec::new(),
            enrollments: HashMap::new(),
            new_enrollments: Vec::new(),
            telemetry: Vec::new(),
        }
    }

    fn profile(&self, learner_id: &str) -> Option<LearnerProfile> {
        self.profiles
            .get(learner_id)
            .cloned()
            .or_else(|| self.tables.read().profiles.get(learner_id).cloned())
    }

    fn enrollment(&self, key: &EnrollmentKey) -> Option<Enrollment> {
        self.enrollments
            .get(key)
            .cloned()
            .or_else(|| self.tables.read().enrollments.get(key).cloned())
    }
}

impl LearningTx for MemoryTx {
    async fn load_profile(&mut self, learner_id: &str) -> Result<Option<LearnerProfile>, StoreError> {
        Ok(self.profile(learner_id))
    }

    async fn list_profiles(&mut self) -> Result<Vec<LearnerProfile>, StoreError> {
        let order: Vec<String> = {
            let tables = self.tables.read();
            tables.profile_order.iter().cloned().collect()
        };
        Ok(order
            .iter()
            .chain(self.new_profiles.iter())
            .filter_map(|id| self.profile(id))
            .collect())
    }

    async fn insert_profile(&mut self, profile: &LearnerProfile) -> Result<(), StoreError> {
        if self.profile(&profile.learner_id).is_none() {
            self.new_profiles.push(profile.learner_id.clone());
        }
        self.profiles
            .insert(profile.learner_id.clone(), profile.clone());
        Ok(())
    }

    async fn update_profile(&mut self, profile: &LearnerProfile) -> Result<(), StoreError> {
        if self.profile(&profile.learner_id).is_none() {
            return Err(StoreError::NotFound(format!("learner {}", profile.learner_id)));
        }
        self.profiles
            .insert(profile.learner_id.clone(), profile.clone());
        Ok(())
    }

    async fn course_exists(&mut self, course_id: &str) -> Result<bool, StoreError> {
        Ok(self.courses.iter().any(|c| c.course_id == course_id)
            || self
                .tables
                .read()
                .courses
                .iter()
                .any(|c| c.course_id == course_id))
    }

    async fn list_courses(&mut self) -> Result<Vec<Course>, StoreError> {
        let mut courses = self.tables.read().courses.clone();
        courses.extend(self.courses.iter().cloned());
        Ok(courses)
    }

    async fn insert_course(&mut self, course: &Course) -> Result<(), StoreError> {
        self.courses.push(course.clone());
        Ok(())
    }

    async fn get_or_create_enrollment(
        &mut self,
        learner_id: &str,
        course_id: &str,
    ) -> Result<Enrollment, StoreError> {
        let key = (learner_id.to_string(), course_id.to_string());
        if let Some(existing) = self.enrollment(&key) {
            return Ok(existing);
        }
        let fresh = Enrollment::new(learner_id, course_id);
        self.enrollments.insert(key.clone(), fresh.clone());
        self.new_enrollments.push(key);
        Ok(fresh)
    }

    async fn update_enrollment(&mut self, enrollment: &Enrollment) -> Result<(), StoreError> {
        let key = (enrollment.learner_id.clone(), enrollment.course_id.clone());
        if self.enrollment(&key).is_none() {
            return Err(StoreError::NotFound(format!(
                "enrollment {}/{}",
                enrollment.learner_id, enrollment.course_id
            )));
        }
        self.enrollments.insert(key, enrollment.clone());
        Ok(())
    }

    async fn list_enrollments(&mut self, learner_id: &str) -> Result<Vec<Enrollment>, StoreError> {
        let keys: Vec<EnrollmentKey> = {
            let tables = self.tables.read();
            tables
                .enrollment_order
                .iter()
                .filter(|(learner, _)| learner == learner_id)
                .cloned()
                .collect()
        };
        Ok(keys
            .iter()
            .chain(self.new_enrollments.iter().filter(|(learner, _)| learner == learner_id))
            .filter_map(|key| self.enrollment(key))
            .collect())
    }

    async fn append_telemetry(&mut self, record: &TelemetryRecord) -> Result<(), StoreError> {
        self.telemetry.push(record.clone());
        Ok(())
    }

    async fn recent_telemetry(
        &mut self,
        learner_id: &str,
        limit: u32,
    ) -> Result<Vec<TelemetryRecord>, StoreError> {
        let tables = self.tables.read();
        Ok(tables
            .telemetry
            .iter()
            .chain(self.telemetry.iter())
            .rev()
            .filter(|record| record.learner_id == learner_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn commit(self) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        tables.profile_order.extend(self.new_profiles);
        tables.profiles.extend(self.profiles);
        tables.courses.extend(self.courses);
        for key in self.new_enrollments {
            if !tables.enrollments.contains_key(&key) {
                tables.enrollment_order.push(key);
            }
        }
        tables.enrollments.extend(self.enrollments);
        tables.telemetry.extend(self.telemetry);
        Ok(())
    }
}
