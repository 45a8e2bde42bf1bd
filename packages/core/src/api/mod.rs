pub mod health;
pub mod weather;

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;

use crate::services::weather::WeatherService;

/// Assemble the full API router. `main.rs` and the integration tests share
/// this so they exercise the same routes and layers.
pub fn router(service: Arc<WeatherService>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/weather", get(weather::get_weather))
        .with_state(service)
        .layer(CorsLayer::permissive())
}
