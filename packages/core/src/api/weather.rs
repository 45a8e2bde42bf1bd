//! `GET /weather?location=<name>&refresh=true`
//!
//! Every response body is a JSON envelope carrying a `success` flag:
//! `{"success":true,"data":{..}}` or `{"success":false,"error":".."}`.

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::services::weather::WeatherService;
use crate::types::WeatherRecord;

/// Shared state for the weather route.
pub type WeatherState = Arc<WeatherService>;

pub const MISSING_LOCATION_MESSAGE: &str = "Location query parameter is required.";
pub const NOT_FOUND_MESSAGE: &str = "Weather data for the specified location not found.";

#[derive(Debug, Deserialize)]
pub struct WeatherQuery {
    pub location: Option<String>,
    pub refresh: Option<String>,
}

impl WeatherQuery {
    /// Only the literal string `true` forces a refresh.
    fn force_refresh(&self) -> bool {
        self.refresh.as_deref() == Some("true")
    }
}

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn failure(message: &str) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.to_string()),
        }
    }
}

fn missing_location() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(Envelope::<WeatherRecord>::failure(MISSING_LOCATION_MESSAGE)),
    )
        .into_response()
}

pub async fn get_weather(
    State(service): State<WeatherState>,
    query: Result<Query<WeatherQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let params = match query {
        Ok(Query(params)) => params,
        Err(rejection) => {
            tracing::warn!("Rejected weather query: {}", rejection);
            return Ok(missing_location());
        }
    };

    let location = match params.location.as_deref() {
        Some(location) if !location.is_empty() => location,
        _ => return Ok(missing_location()),
    };

    let result = service
        .get_weather(location, params.force_refresh())
        .await
        .inspect_err(|err| {
            tracing::error!("Error in get_weather for {}: {}", location, err);
        })?;

    Ok(match result {
        Some(record) => (StatusCode::OK, Json(Envelope::ok(record))).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(Envelope::<WeatherRecord>::failure(NOT_FOUND_MESSAGE)),
        )
            .into_response(),
    })
}
