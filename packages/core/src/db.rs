use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

/// One row per normalized location. `location_key` is the lowercase
/// identity; `location` keeps the casing of the most recent upsert.
const CREATE_WEATHER_RECORDS: &str = "
CREATE TABLE IF NOT EXISTS weather_records (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    location_key TEXT    NOT NULL UNIQUE,
    location     TEXT    NOT NULL,
    temperature  REAL    NOT NULL,
    description  TEXT    NOT NULL,
    humidity     INTEGER NOT NULL,
    wind_speed   REAL    NOT NULL,
    observed_at  TEXT    NOT NULL
)";

/// Open a SQLite pool and make sure the schema exists.
///
/// Every connection to `sqlite::memory:` gets its own database, so
/// in-memory URLs are limited to a single connection.
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    sqlx::query(CREATE_WEATHER_RECORDS).execute(&pool).await?;

    Ok(pool)
}
