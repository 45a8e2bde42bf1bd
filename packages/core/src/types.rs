//! Core data types shared by the lookup path and the refresh worker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which layer handed a record back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Cache,
    External,
}

/// Current conditions for one location.
///
/// `location` is the display name; identity is its lowercase form (see
/// [`cache_key`] and the store's normalized key).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherRecord {
    pub location: String,
    pub temperature: f64,
    pub description: String,
    pub humidity: i64,
    pub wind_speed: f64,
    pub timestamp: DateTime<Utc>,
    pub source: Source,
}

/// A record without its identity and source tag; the store upsert payload.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherObservation {
    pub temperature: f64,
    pub description: String,
    pub humidity: i64,
    pub wind_speed: f64,
    pub timestamp: DateTime<Utc>,
}

impl WeatherRecord {
    pub fn from_observation(location: impl Into<String>, obs: WeatherObservation, source: Source) -> Self {
        Self {
            location: location.into(),
            temperature: obs.temperature,
            description: obs.description,
            humidity: obs.humidity,
            wind_speed: obs.wind_speed,
            timestamp: obs.timestamp,
            source,
        }
    }

    pub fn observation(&self) -> WeatherObservation {
        WeatherObservation {
            temperature: self.temperature,
            description: self.description.clone(),
            humidity: self.humidity,
            wind_speed: self.wind_speed,
            timestamp: self.timestamp,
        }
    }

    pub fn with_source(mut self, source: Source) -> Self {
        self.source = source;
        self
    }
}

/// Published whenever a caller forces a refresh.
///
/// `location` is kept exactly as the caller supplied it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshEvent {
    pub location: String,
    pub timestamp: DateTime<Utc>,
}

impl RefreshEvent {
    pub fn now(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Cache key for a location: `weather:<lowercased location>`.
pub fn cache_key(location: &str) -> String {
    format!("weather:{}", location.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_record() -> WeatherRecord {
        WeatherRecord {
            location: "Bandung".into(),
            temperature: 25.0,
            description: "scattered clouds".into(),
            humidity: 70,
            wind_speed: 2.5,
            timestamp: Utc::now(),
            source: Source::External,
        }
    }

    #[test]
    fn record_serializes_with_camel_case_and_lowercase_source() {
        let json = serde_json::to_value(sample_record()).unwrap();

        assert_eq!(json["windSpeed"], 2.5);
        assert_eq!(json["source"], "external");
        assert!(json["timestamp"].is_string());
        assert!(json.get("wind_speed").is_none());
    }

    #[test]
    fn with_source_only_changes_the_tag() {
        let record = sample_record();
        let tagged = record.clone().with_source(Source::Cache);

        assert_eq!(tagged.source, Source::Cache);
        assert_eq!(tagged.observation(), record.observation());
        assert_eq!(tagged.location, record.location);
    }

    #[test]
    fn refresh_event_keeps_location_casing() {
        let event = RefreshEvent::now("Denpasar");
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["location"], "Denpasar");
        assert!(json["timestamp"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn cache_key_lowercases_location() {
        assert_eq!(cache_key("Bandung"), "weather:bandung");
        assert_eq!(cache_key("NEW York"), "weather:new york");
    }

    proptest! {
        #[test]
        fn cache_key_ignores_location_casing(location in "[a-zA-Z ]{1,24}") {
            prop_assert_eq!(cache_key(&location.to_uppercase()), cache_key(&location.to_lowercase()));
            prop_assert!(cache_key(&location).starts_with("weather:"));
        }
    }
}
