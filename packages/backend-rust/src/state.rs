use std::sync::Arc;
use std::time::{Instant, SystemTime};

use studysense_signals::SignalExtractor;

use crate::db::LearningBackend;
use crate::services::accrual::ProgressAccrualEngine;
use crate::services::learners::LearnerService;
use crate::services::observation::ObservationService;
use crate::services::{LearnerLocks, NoiseHandle};

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    started_at_system: SystemTime,
    backend: Arc<LearningBackend>,
    observations: Arc<ObservationService<LearningBackend>>,
    learners: Arc<LearnerService<LearningBackend>>,
}

impl AppState {
    /// Wire the services around one backend. The accrual engine and the
    /// learner service share a lock table so profile edits and observations
    /// for the same learner never interleave.
    pub fn new(backend: LearningBackend, noise: NoiseHandle) -> Self {
        let backend = Arc::new(backend);
        let locks = Arc::new(LearnerLocks::new());
        let engine = Arc::new(ProgressAccrualEngine::new(
            Arc::clone(&backend),
            Arc::clone(&locks),
            noise.clone(),
        ));

        Self {
            started_at: Instant::now(),
            started_at_system: SystemTime::now(),
            observations: Arc::new(ObservationService::new(
                Arc::new(SignalExtractor::default()),
                engine,
                noise,
            )),
            learners: Arc::new(LearnerService::new(Arc::clone(&backend), locks)),
            backend,
        }
    }

    pub fn backend(&self) -> &LearningBackend {
        &self.backend
    }

    pub fn observations(&self) -> &ObservationService<LearningBackend> {
        &self.observations
    }

    pub fn learners(&self) -> &LearnerService<LearningBackend> {
        &self.learners
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn started_at_system(&self) -> SystemTime {
        self.started_at_system
    }
}
