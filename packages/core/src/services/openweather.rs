use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::error::AppError;
use crate::types::{Source, WeatherRecord};

/// Third-party source of current conditions.
#[async_trait]
pub trait WeatherSource {
    /// `Ok(None)` when the provider does not know the location. Every other
    /// failure is an [`AppError::Upstream`].
    async fn fetch_current(&self, location: &str) -> Result<Option<WeatherRecord>, AppError>;
}

#[derive(Clone)]
pub struct OpenWeatherClient {
    base_url: String,
    api_key: String,
    http: Client,
}

impl OpenWeatherClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            base_url,
            api_key,
            http: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[derive(Debug, Deserialize)]
pub struct OpenWeatherCurrent {
    pub name: String,
    pub main: MainReadings,
    pub weather: Vec<Condition>,
    pub wind: Wind,
}

#[derive(Debug, Deserialize)]
pub struct MainReadings {
    pub temp: f64,
    pub humidity: i64,
}

#[derive(Debug, Deserialize)]
pub struct Condition {
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct Wind {
    pub speed: f64,
}

impl OpenWeatherCurrent {
    fn into_record(self) -> Result<WeatherRecord, AppError> {
        let description = self
            .weather
            .into_iter()
            .next()
            .map(|condition| condition.description)
            .ok_or_else(|| AppError::Upstream("OpenWeather returned no weather conditions".into()))?;

        Ok(WeatherRecord {
            location: self.name,
            temperature: self.main.temp,
            description,
            humidity: self.main.humidity,
            wind_speed: self.wind.speed,
            timestamp: Utc::now(),
            source: Source::External,
        })
    }
}

#[async_trait]
impl WeatherSource for OpenWeatherClient {
    async fn fetch_current(&self, location: &str) -> Result<Option<WeatherRecord>, AppError> {
        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("q", location),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ])
            .send()
            .await
            .map_err(|err| {
                tracing::error!("Error fetching weather from external API for {}: {}", location, err);
                AppError::Upstream(err.to_string())
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::warn!("External API does not know location {}", location);
            return Ok(None);
        }

        if !response.status().is_success() {
            tracing::error!(
                "Error fetching weather from external API for {}: HTTP {}",
                location,
                response.status()
            );
            return Err(AppError::Upstream(format!(
                "OpenWeather returned HTTP {}",
                response.status()
            )));
        }

        let current = response
            .json::<OpenWeatherCurrent>()
            .await
            .map_err(|err| AppError::Upstream(format!("Malformed OpenWeather response: {}", err)))?;

        current.into_record().map(Some)
    }
}
