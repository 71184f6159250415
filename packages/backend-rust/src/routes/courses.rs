use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::response::{ok, AppError};
use crate::services::learners::NewCourse;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_courses).post(create_course))
}

async fn list_courses(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let courses = state.learners().list_courses().await?;
    Ok(ok(courses))
}

async fn create_course(
    State(state): State<AppState>,
    payload: Result<Json<NewCourse>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(input) = payload?;
    if input.title.trim().is_empty() {
        return Err(AppError::validation("title must not be empty"));
    }
    if input.duration_minutes.is_some_and(|d| d <= 0) {
        return Err(AppError::validation("durationMinutes must be positive"));
    }

    let course = state.learners().create_course(input).await?;
    Ok((StatusCode::CREATED, ok(course)))
}
