#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use studysense_backend::db::{LearningBackend, MemoryLearningStore};
use studysense_backend::services::NoiseHandle;
use studysense_backend::state::AppState;
use studysense_signals::ZeroNoise;
use tower::ServiceExt;

/// App over an empty in-memory store with noise switched off.
pub fn create_test_app() -> Router {
    studysense_backend::app(test_state())
}

pub fn test_state() -> AppState {
    AppState::new(
        LearningBackend::Memory(MemoryLearningStore::new()),
        NoiseHandle::new(ZeroNoise),
    )
}

pub async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => request
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

pub async fn create_learner(app: &Router, name: &str, capacity: i32) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/learners",
        Some(serde_json::json!({ "name": name, "cognitiveCapacity": capacity })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"]["learnerId"].as_str().unwrap().to_string()
}

pub async fn create_course(app: &Router, title: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/courses",
        Some(serde_json::json!({ "title": title })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"]["courseId"].as_str().unwrap().to_string()
}
