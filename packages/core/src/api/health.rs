use axum::{http::header, response::IntoResponse};

/// Liveness probe. Does not touch the store, cache or broker.
pub async fn health() -> impl IntoResponse {
    ([(header::CACHE_CONTROL, "no-store")], "API Service is healthy!")
}
