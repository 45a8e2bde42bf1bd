//! Durable per-location weather records.
//!
//! [`WeatherStore`] is the port the lookup path depends on;
//! [`WeatherRepository`] is the SQLite implementation. Matching is
//! case-insensitive and exact: both reads and writes go through the
//! lowercase `location_key` column, which carries a UNIQUE constraint so a
//! location can never be stored twice.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::error::AppError;
use crate::types::{Source, WeatherObservation, WeatherRecord};

#[async_trait]
pub trait WeatherStore {
    /// Case-insensitive exact match on the location name.
    async fn find_by_location(&self, location: &str) -> Result<Option<WeatherRecord>, AppError>;

    /// Insert or replace the record for `location`. The stored name is
    /// always the literal `location` argument.
    async fn upsert(
        &self,
        location: &str,
        observation: &WeatherObservation,
    ) -> Result<WeatherRecord, AppError>;
}

/// Repository for reading and writing weather records to SQLite.
pub struct WeatherRepository {
    pool: SqlitePool,
}

impl WeatherRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Number of stored records.
    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM weather_records")
            .fetch_one(&self.pool)
            .await?;
        row.try_get("cnt")
    }
}

fn location_key(location: &str) -> String {
    location.to_lowercase()
}

fn row_to_record(row: &SqliteRow) -> Result<WeatherRecord, sqlx::Error> {
    let observed_at: String = row.try_get("observed_at")?;
    let timestamp = DateTime::parse_from_rfc3339(&observed_at)
        .map_err(|err| sqlx::Error::Decode(Box::new(err)))?
        .with_timezone(&Utc);

    Ok(WeatherRecord {
        location: row.try_get("location")?,
        temperature: row.try_get("temperature")?,
        description: row.try_get("description")?,
        humidity: row.try_get("humidity")?,
        wind_speed: row.try_get("wind_speed")?,
        timestamp,
        // Everything in the store came from the external source originally.
        source: Source::External,
    })
}

#[async_trait]
impl WeatherStore for WeatherRepository {
    async fn find_by_location(&self, location: &str) -> Result<Option<WeatherRecord>, AppError> {
        let row = sqlx::query(
            "SELECT location, temperature, description, humidity, wind_speed, observed_at
             FROM weather_records
             WHERE location_key = ?",
        )
        .bind(location_key(location))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_record).transpose()?)
    }

    async fn upsert(
        &self,
        location: &str,
        observation: &WeatherObservation,
    ) -> Result<WeatherRecord, AppError> {
        let row = sqlx::query(
            "INSERT INTO weather_records
             (location_key, location, temperature, description, humidity, wind_speed, observed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(location_key) DO UPDATE SET
                 location    = excluded.location,
                 temperature = excluded.temperature,
                 description = excluded.description,
                 humidity    = excluded.humidity,
                 wind_speed  = excluded.wind_speed,
                 observed_at = excluded.observed_at
             RETURNING location, temperature, description, humidity, wind_speed, observed_at",
        )
        .bind(location_key(location))
        .bind(location)
        .bind(observation.temperature)
        .bind(&observation.description)
        .bind(observation.humidity)
        .bind(observation.wind_speed)
        .bind(observation.timestamp.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;

        Ok(row_to_record(&row)?)
    }
}
