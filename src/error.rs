//! Error types shared across the orchestrator

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Crate-wide error type
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Model variant not found: {0}")]
    ModelNotFound(String),

    #[error("Image source unreachable: {0}")]
    UnreachableSource(String),

    #[error("Generation backend error: {0}")]
    BackendError(String),

    /// A whole attempt produced no image
    #[error("{0}")]
    EmptyBatch(String),

    #[error("Request rejected by content moderation: {0}")]
    ModerationRejected(String),

    #[error("Account suspended: {0}")]
    AccountSuspended(String),

    /// Retries exhausted; carries the last attempt's message verbatim
    #[error("{0}")]
    TerminalFailure(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Short machine-readable kind used in API error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config_error",
            AppError::HttpClient(_) => "http_client_error",
            AppError::Serialization(_) => "serialization_error",
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::ModelNotFound(_) => "model_not_found",
            AppError::UnreachableSource(_) => "unreachable_source",
            AppError::BackendError(_) => "backend_error",
            AppError::EmptyBatch(_) => "empty_batch",
            AppError::ModerationRejected(_) => "moderation_rejected",
            AppError::AccountSuspended(_) => "account_suspended",
            AppError::TerminalFailure(_) => "terminal_failure",
            AppError::Internal(_) => "internal_error",
        }
    }

    /// Errors the retry machine must never retry
    pub fn is_hard_stop(&self) -> bool {
        matches!(
            self,
            AppError::AccountSuspended(_)
                | AppError::InvalidRequest(_)
                | AppError::ModelNotFound(_)
                | AppError::ModerationRejected(_)
        )
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::ModelNotFound(_) => StatusCode::NOT_FOUND,
            AppError::AccountSuspended(_) => StatusCode::FORBIDDEN,
            AppError::ModerationRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::TerminalFailure(_) | AppError::EmptyBatch(_) | AppError::BackendError(_) => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, kind = self.kind(), "Request failed");
        }
        let body = Json(json!({
            "error": {
                "message": self.to_string(),
                "type": self.kind(),
            }
        }));
        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
