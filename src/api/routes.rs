//! HTTP route definitions

use crate::api::handlers;
use crate::api::models::*;
use crate::orchestrator::GenerationMode;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Fashion Generation Orchestrator API",
        version = "0.1.0",
        description = "Multi-image fashion generation: re-pose, virtual try-on, model creation and concept copy.",
        license(name = "MIT"),
    ),
    paths(
        handlers::generate,
        handlers::generate_stream,
        handlers::list_history,
        handlers::list_models,
        handlers::health_check,
    ),
    components(schemas(
        GenerationMode,
        GenerateRequest,
        ImageData,
        HistoryItemResponse,
        HistoryListResponse,
        ModelInfo,
        ModelListResponse,
        HealthResponse,
        StatusEventData,
        ItemEventData,
        ClearedEventData,
        ErrorEventData,
    )),
    tags(
        (name = "Generations", description = "Image generation endpoints"),
        (name = "History", description = "Per-caller generation history"),
        (name = "Models", description = "Configured model variants"),
        (name = "Health", description = "Health endpoints"),
    )
)]
pub struct ApiDoc;

/// Create the main application router
pub fn create_router(state: Arc<crate::AppState>) -> Router {
    let api_routes = Router::new()
        .route("/generations", post(handlers::generate))
        .route("/generations/stream", post(handlers::generate_stream))
        .route("/history", get(handlers::list_history))
        .route("/models", get(handlers::list_models));

    Router::new()
        .route("/health", get(handlers::health_check))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/v1", api_routes)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
