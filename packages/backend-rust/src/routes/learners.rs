use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;

use crate::response::{ok, AppError};
use crate::services::learners::{
    DEFAULT_COGNITIVE_CAPACITY, MAX_COGNITIVE_CAPACITY, MIN_COGNITIVE_CAPACITY,
};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_learners).post(create_learner))
        .route("/:learner_id/dashboard", get(dashboard))
        .route("/:learner_id/observations", post(ingest_observation))
        .route("/:learner_id/preview", post(preview))
        .route("/:learner_id/limits", put(set_limits))
        .route("/:learner_id/courses", get(learner_courses))
        .route("/:learner_id/courses/:course_id/start", post(start_course))
        .route("/:learner_id/courses/:course_id/progress", get(course_progress))
        .route("/:learner_id/telemetry", get(telemetry))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateLearnerRequest {
    name: String,
    cognitive_capacity: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObservationRequest {
    elapsed_minutes: f64,
    image_data: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreviewRequest {
    image_data: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LimitsRequest {
    cognitive_capacity: i32,
    assigned_course_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelemetryQuery {
    limit: Option<u32>,
}

fn validate_capacity(capacity: i32) -> Result<i32, AppError> {
    if (MIN_COGNITIVE_CAPACITY..=MAX_COGNITIVE_CAPACITY).contains(&capacity) {
        Ok(capacity)
    } else {
        Err(AppError::validation(format!(
            "cognitiveCapacity must be between {MIN_COGNITIVE_CAPACITY} and {MAX_COGNITIVE_CAPACITY}"
        )))
    }
}

fn validate_elapsed(minutes: f64) -> Result<f64, AppError> {
    if minutes.is_finite() && minutes > 0.0 {
        Ok(minutes)
    } else {
        Err(AppError::validation("elapsedMinutes must be a positive number"))
    }
}

async fn create_learner(
    State(state): State<AppState>,
    payload: Result<Json<CreateLearnerRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    if request.name.trim().is_empty() {
        return Err(AppError::validation("name must not be empty"));
    }
    let capacity = validate_capacity(request.cognitive_capacity.unwrap_or(DEFAULT_COGNITIVE_CAPACITY))?;

    let profile = state.learners().create_learner(&request.name, capacity).await?;
    Ok((StatusCode::CREATED, ok(profile)))
}

async fn list_learners(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.learners().list_learners().await?))
}

async fn dashboard(
    State(state): State<AppState>,
    Path(learner_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.learners().dashboard(&learner_id).await?))
}

async fn ingest_observation(
    State(state): State<AppState>,
    Path(learner_id): Path<String>,
    payload: Result<Json<ObservationRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    let minutes = validate_elapsed(request.elapsed_minutes)?;

    let outcome = state
        .observations()
        .ingest_observation(&learner_id, minutes, request.image_data)
        .await?;
    Ok(ok(outcome))
}

async fn preview(
    State(state): State<AppState>,
    Path(learner_id): Path<String>,
    payload: Result<Json<PreviewRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    let preview = state
        .observations()
        .preview(&learner_id, request.image_data)
        .await?;
    Ok(ok(preview))
}

async fn start_course(
    State(state): State<AppState>,
    Path((learner_id, course_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.learners().start_course(&learner_id, &course_id).await?))
}

async fn set_limits(
    State(state): State<AppState>,
    Path(learner_id): Path<String>,
    payload: Result<Json<LimitsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    let capacity = validate_capacity(request.cognitive_capacity)?;
    let assigned = request
        .assigned_course_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());

    let profile = state
        .learners()
        .set_limits(&learner_id, capacity, assigned)
        .await?;
    Ok(ok(profile))
}

async fn learner_courses(
    State(state): State<AppState>,
    Path(learner_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.learners().learner_courses(&learner_id).await?))
}

async fn course_progress(
    State(state): State<AppState>,
    Path((learner_id, course_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.learners().course_progress(&learner_id, &course_id).await?))
}

async fn telemetry(
    State(state): State<AppState>,
    Path(learner_id): Path<String>,
    Query(query): Query<TelemetryQuery>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.learners().telemetry(&learner_id, query.limit).await?))
}
