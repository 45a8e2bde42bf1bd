use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Unified application error.
///
/// Every port (cache, store, external source, broker, notifier) reports
/// failures through this type so the lookup path and the worker can decide
/// uniformly what to propagate and what to swallow.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("Queue error: {0}")]
    Queue(String),

    /// The external weather source failed for a reason other than "not found".
    #[error("Upstream fetch error: {0}")]
    Upstream(String),

    #[error("Notification error: {0}")]
    Notification(String),
}

pub const UPSTREAM_ERROR_MESSAGE: &str = "Failed to fetch weather data from external source.";
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred.";

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!("Unhandled error: {}", self);

        let message = match self {
            AppError::Upstream(_) => UPSTREAM_ERROR_MESSAGE,
            _ => GENERIC_ERROR_MESSAGE,
        };

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "error": message })),
        )
            .into_response()
    }
}
