pub mod accrual;
pub mod learners;
pub mod observation;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use studysense_signals::{NoiseSource, SeededNoise};
use tokio::sync::OwnedMutexGuard;

/// Shared handle to the process-wide noise stream.
///
/// Draws happen under a short synchronous lock that is never held across an
/// `.await`.
#[derive(Clone)]
pub struct NoiseHandle {
    source: Arc<Mutex<Box<dyn NoiseSource + Send>>>,
}

impl NoiseHandle {
    pub fn new(source: impl NoiseSource + Send + 'static) -> Self {
        Self {
            source: Arc::new(Mutex::new(Box::new(source))),
        }
    }

    pub fn seeded(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::new(SeededNoise::from_seed(seed)),
            None => Self::new(SeededNoise::from_entropy()),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut dyn NoiseSource) -> R) -> R {
        let mut source = self.source.lock();
        f(&mut **source)
    }
}

const LOCK_MAP_PRUNE_THRESHOLD: usize = 1024;

/// One async mutex per learner. Holding a learner's guard serializes every
/// read-modify-write on that learner's profile and enrollments; other
/// learners are unaffected.
#[derive(Default)]
pub struct LearnerLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl LearnerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, learner_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            if locks.len() >= LOCK_MAP_PRUNE_THRESHOLD {
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            Arc::clone(locks.entry(learner_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
