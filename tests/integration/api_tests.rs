//! API endpoint integration tests

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use fashion_gen_orchestrator::api::routes::create_router;
use fashion_gen_orchestrator::backend::{
    GenerationCall, GenerationResponse, GeneratorRegistry, ImageGenerator, InlineData,
};
use fashion_gen_orchestrator::config::Settings;
use fashion_gen_orchestrator::orchestrator::{
    ImageCodec, InMemoryHistory, InMemorySafetyTracker, Orchestrator, RetryPolicy,
};
use fashion_gen_orchestrator::{AppError, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tower::ServiceExt;

/// Returns an image unless the instruction asks for an outage
struct EchoGenerator;

#[async_trait]
impl ImageGenerator for EchoGenerator {
    fn name(&self) -> &str {
        "standard"
    }

    fn model(&self) -> &str {
        "gemini-2.5-flash-image"
    }

    async fn generate(&self, call: &GenerationCall) -> fashion_gen_orchestrator::Result<GenerationResponse> {
        if call.instruction().contains("simulate-outage") {
            return Err(AppError::BackendError("scripted failure".to_string()));
        }
        Ok(GenerationResponse::with_image(InlineData::new("image/png", "iVBORw0KGgo=")))
    }
}

fn app() -> Router {
    let settings = Settings::default();
    let registry = Arc::new(GeneratorRegistry::new("standard"));
    registry.register(Arc::new(EchoGenerator)).unwrap();

    let orchestrator = Orchestrator::new(
        registry.clone(),
        ImageCodec::new(Duration::from_secs(1)).unwrap(),
        Arc::new(InMemorySafetyTracker::new(3)),
        Arc::new(InMemoryHistory::new(10)),
        RetryPolicy::immediate(),
    );

    create_router(Arc::new(AppState {
        settings: Arc::new(RwLock::new(settings)),
        registry,
        orchestrator: Arc::new(orchestrator),
    }))
}

fn post_json(uri: &str, owner: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-user-id", owner)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str, owner: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-user-id", owner)
        .body(Body::empty())
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let response = app().oneshot(get("/health", "anyone")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["models"], 1);
    assert_eq!(body["max_batch_size"], 4);
}

#[tokio::test]
async fn test_list_models_marks_default() {
    let response = app().oneshot(get("/v1/models", "anyone")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["models"][0]["name"], "standard");
    assert_eq!(body["models"][0]["default"], true);
}

#[tokio::test]
async fn test_generate_returns_history_item() {
    let request = post_json(
        "/v1/generations",
        "alice",
        json!({
            "mode": "RE_POSE",
            "primary_image": "data:image/jpeg;base64,/9j/4AAQ",
            "batch_size": 2
        }),
    );

    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["mode"], "RE_POSE");
    assert_eq!(body["requested"], 2);
    assert_eq!(body["images"].as_array().unwrap().len(), 2);
    assert_eq!(body["images"][1]["index"], 1);
    assert_eq!(body["images"][0]["mime_type"], "image/png");
    assert_eq!(body["model"], "standard");
    assert_eq!(body["prompt"], "Re-pose (no prompt)");
}

#[tokio::test]
async fn test_generate_invalid_request_is_400() {
    let request = post_json(
        "/v1/generations",
        "alice",
        json!({ "mode": "TRY_ON", "primary_image": "data:image/jpeg;base64,/9j/4AAQ" }),
    );

    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert_eq!(body["error"]["type"], "invalid_request");
}

#[tokio::test]
async fn test_generate_unknown_model_is_404() {
    let request = post_json(
        "/v1/generations",
        "alice",
        json!({
            "mode": "RE_POSE",
            "primary_image": "data:image/jpeg;base64,/9j/4AAQ",
            "model": "ultra"
        }),
    );

    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_generate_terminal_failure_is_502() {
    let request = post_json(
        "/v1/generations",
        "alice",
        json!({
            "mode": "RE_POSE",
            "primary_image": "data:image/jpeg;base64,/9j/4AAQ",
            "prompt": "simulate-outage"
        }),
    );

    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let body = json_body(response).await;
    assert_eq!(body["error"]["type"], "terminal_failure");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .starts_with("No images were generated"));
}

#[tokio::test]
async fn test_history_is_per_caller() {
    let app = app();
    let request = post_json(
        "/v1/generations",
        "alice",
        json!({
            "mode": "CREATE_MODEL",
            "primary_image": "data:image/jpeg;base64,/9j/4AAQ",
            "prompt": "studio lighting"
        }),
    );
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let alice = json_body(app.clone().oneshot(get("/v1/history", "alice")).await.unwrap()).await;
    assert_eq!(alice["items"].as_array().unwrap().len(), 1);
    assert_eq!(alice["items"][0]["prompt"], "studio lighting");

    let bob = json_body(app.oneshot(get("/v1/history", "bob")).await.unwrap()).await;
    assert!(bob["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_stream_emits_progress_and_complete() {
    let request = post_json(
        "/v1/generations/stream",
        "alice",
        json!({
            "mode": "RE_POSE",
            "primary_image": "data:image/jpeg;base64,/9j/4AAQ",
            "batch_size": 2
        }),
    );

    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();

    let status_at = text.find("event: status").unwrap();
    let item_at = text.find("event: item").unwrap();
    let complete_at = text.find("event: complete").unwrap();
    assert!(status_at < item_at && item_at < complete_at);
    assert_eq!(text.matches("event: item").count(), 2);
    assert!(!text.contains("event: error"));
}

#[tokio::test]
async fn test_stream_reports_terminal_error() {
    let request = post_json(
        "/v1/generations/stream",
        "alice",
        json!({
            "mode": "RE_POSE",
            "primary_image": "data:image/jpeg;base64,/9j/4AAQ",
            "prompt": "simulate-outage"
        }),
    );

    let response = app().oneshot(request).await.unwrap();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();

    assert!(text.contains("event: cleared"));
    assert!(text.contains("event: error"));
    assert!(text.contains("terminal_failure"));
    assert!(!text.contains("event: complete"));
}
