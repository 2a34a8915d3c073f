//! HTTP request handlers

use crate::api::models::{
    ClearedEventData, ErrorEventData, GenerateRequest, HealthResponse, HistoryItemResponse,
    HistoryListResponse, ImageData, ItemEventData, ModelInfo, ModelListResponse, StatusEventData,
};
use crate::error::AppError;
use crate::orchestrator::{ChannelObserver, GenerationEvent};
use crate::AppState;
use axum::{
    extract::State,
    http::HeaderMap,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{stream, Stream, StreamExt};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::info;

/// Header carrying the caller id; authentication happens upstream
pub const OWNER_HEADER: &str = "x-user-id";

const ANONYMOUS_OWNER: &str = "anonymous";

fn owner_from_headers(headers: &HeaderMap) -> String {
    headers
        .get(OWNER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(ANONYMOUS_OWNER)
        .to_string()
}

/// Run a generation request to completion
#[utoipa::path(
    post,
    path = "/v1/generations",
    tag = "Generations",
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "Batch generated", body = HistoryItemResponse),
        (status = 400, description = "Invalid request"),
        (status = 403, description = "Account suspended"),
        (status = 422, description = "Rejected by content moderation"),
        (status = 502, description = "All attempts failed")
    )
)]
pub async fn generate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<HistoryItemResponse>, AppError> {
    let owner = owner_from_headers(&headers);
    info!(owner = %owner, mode = %request.mode, batch_size = request.batch_size, "Received generation request");

    let item = state
        .orchestrator
        .generate(&owner, request.into_generation_request(), &mut ())
        .await?;

    Ok(Json(HistoryItemResponse::from(&item)))
}

fn json_event<T: Serialize>(name: &str, data: &T) -> Event {
    Event::default()
        .event(name)
        .json_data(data)
        .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()))
}

fn progress_event(event: GenerationEvent) -> Event {
    match event {
        GenerationEvent::Status(status) => json_event(
            "status",
            &StatusEventData {
                message: status.to_string(),
            },
        ),
        GenerationEvent::Item { attempt, image } => json_event(
            "item",
            &ItemEventData {
                attempt,
                image: ImageData::from(&image),
            },
        ),
        GenerationEvent::Cleared { attempt } => json_event("cleared", &ClearedEventData { attempt }),
    }
}

fn error_event(error: &AppError) -> Event {
    json_event(
        "error",
        &ErrorEventData {
            message: error.to_string(),
            kind: error.kind().to_string(),
        },
    )
}

/// Run a generation request, streaming progress as Server-Sent Events.
///
/// Emits `status`, `item` and `cleared` events while running, then a single
/// `complete` event with the history item or an `error` event.
#[utoipa::path(
    post,
    path = "/v1/generations/stream",
    tag = "Generations",
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "Event stream of generation progress", body = String, content_type = "text/event-stream")
    )
)]
pub async fn generate_stream(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<GenerateRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let owner = owner_from_headers(&headers);
    info!(owner = %owner, mode = %request.mode, batch_size = request.batch_size, "Received streaming generation request");

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let task = tokio::spawn(async move {
        let mut observer = ChannelObserver::new(tx);
        state
            .orchestrator
            .generate(&owner, request.into_generation_request(), &mut observer)
            .await
    });

    let progress = UnboundedReceiverStream::new(rx).map(progress_event);
    let outcome = stream::once(async move {
        match task.await {
            Ok(Ok(item)) => json_event("complete", &HistoryItemResponse::from(&item)),
            Ok(Err(e)) => error_event(&e),
            Err(e) => error_event(&AppError::Internal(format!("generation task failed: {}", e))),
        }
    });

    Sse::new(progress.chain(outcome).map(Ok)).keep_alive(KeepAlive::default())
}

/// List the caller's history
#[utoipa::path(
    get,
    path = "/v1/history",
    tag = "History",
    responses((status = 200, description = "History items, newest first", body = HistoryListResponse))
)]
pub async fn list_history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<HistoryListResponse>, AppError> {
    let owner = owner_from_headers(&headers);
    let items = state.orchestrator.history(&owner).await?;

    Ok(Json(HistoryListResponse {
        items: items.iter().map(HistoryItemResponse::from).collect(),
    }))
}

/// List configured model variants
#[utoipa::path(
    get,
    path = "/v1/models",
    tag = "Models",
    responses((status = 200, description = "Configured model variants", body = ModelListResponse))
)]
pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<ModelListResponse> {
    let default_variant = state.orchestrator.default_model().to_string();
    let models = state
        .orchestrator
        .models()
        .into_iter()
        .map(|status| ModelInfo::from_status(status, &default_variant))
        .collect();

    Json(ModelListResponse { models })
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses((status = 200, description = "Service health", body = HealthResponse))
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let models = state.registry.len();
    let max_batch_size = state.settings.read().await.generation.max_batch_size;

    Json(HealthResponse {
        status: if models > 0 { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        models,
        max_batch_size,
    })
}
