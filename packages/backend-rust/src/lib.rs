pub mod config;
pub mod db;
pub mod logging;
pub mod response;
pub mod routes;
pub mod seed;
pub mod services;
pub mod state;

use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::{Config, DatabaseTarget};
use crate::db::{LearningBackend, MemoryLearningStore, SqliteLearningStore, StoreInitError};
use crate::services::NoiseHandle;
use crate::state::AppState;

pub async fn open_backend(target: &DatabaseTarget) -> Result<LearningBackend, StoreInitError> {
    Ok(match target {
        DatabaseTarget::Sqlite(path) => LearningBackend::Sqlite(SqliteLearningStore::open(path).await?),
        DatabaseTarget::Memory => {
            tracing::info!("using in-memory store, data will not survive a restart");
            LearningBackend::Memory(MemoryLearningStore::new())
        }
    })
}

pub async fn build_state(config: &Config) -> Result<AppState, StoreInitError> {
    let backend = open_backend(&config.database).await?;
    let state = AppState::new(backend, NoiseHandle::seeded(config.noise_seed));
    if config.seed_demo_data {
        seed::seed_demo_data(state.learners()).await;
    }
    Ok(state)
}

pub fn app(state: AppState) -> axum::Router {
    routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn create_app(config: &Config) -> Result<axum::Router, StoreInitError> {
    Ok(app(build_state(config).await?))
}
