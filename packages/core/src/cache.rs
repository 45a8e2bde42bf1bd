//! Cache port and its in-process backend.
//!
//! [`CacheBackend`] is the raw string key/value seam with per-entry TTL.
//! [`CacheRepository`] layers JSON (de)serialization on top so callers work
//! with typed values. A value that no longer deserializes is reported as
//! [`AppError::Cache`], the same as a transport failure.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::{future::Cache, Expiry};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::AppError;

/// Default time-to-live for weather entries.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Default bound on the number of cached locations.
pub const DEFAULT_MAX_ENTRIES: u64 = 10_000;

#[async_trait]
pub trait CacheBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), AppError>;
    async fn delete(&self, key: &str) -> Result<(), AppError>;
}

#[derive(Debug, Clone)]
struct CachedText {
    text: String,
    ttl: Duration,
}

/// Each entry expires after the TTL it was written with. An overwrite
/// restarts the clock.
struct PerEntryTtl;

impl Expiry<String, CachedText> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedText,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CachedText,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Bounded Moka cache with per-entry TTL.
///
/// Expired entries are evicted by Moka's housekeeping, whether or not they
/// are read again.
#[derive(Clone)]
pub struct MokaCache {
    cache: Cache<String, CachedText>,
}

impl MokaCache {
    pub fn new(max_entries: u64) -> Self {
        Self {
            cache: Cache::builder()
                .name("weather")
                .max_capacity(max_entries)
                .expire_after(PerEntryTtl)
                .build(),
        }
    }

    /// Number of live entries, after pending evictions have run.
    pub async fn len(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MokaCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

#[async_trait]
impl CacheBackend for MokaCache {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self.cache.get(key).await.map(|entry| entry.text))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), AppError> {
        self.cache
            .insert(key.to_string(), CachedText { text: value, ttl })
            .await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.cache.invalidate(key).await;
        tracing::debug!("Cache invalidated for key: {}", key);
        Ok(())
    }
}

/// Typed facade over a [`CacheBackend`].
#[derive(Clone)]
pub struct CacheRepository {
    backend: Arc<dyn CacheBackend + Send + Sync>,
}

impl CacheRepository {
    pub fn new(backend: Arc<dyn CacheBackend + Send + Sync>) -> Self {
        Self { backend }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError> {
        let raw = match self.backend.get(key).await {
            Ok(raw) => raw,
            Err(err) => {
                tracing::error!("Error getting data from cache for key {}: {}", key, err);
                return Err(err);
            }
        };

        raw.map(|text| {
            serde_json::from_str(&text).map_err(|err| {
                AppError::Cache(format!("Undecodable cache value for key {}: {}", key, err))
            })
        })
        .transpose()
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<(), AppError> {
        let text = serde_json::to_string(value)
            .map_err(|err| AppError::Cache(format!("Unencodable cache value for key {}: {}", key, err)))?;

        self.backend.set(key, text, ttl).await.inspect_err(|err| {
            tracing::error!("Error setting data to cache for key {}: {}", key, err);
        })
    }

    pub async fn invalidate(&self, key: &str) -> Result<(), AppError> {
        self.backend.delete(key).await.inspect_err(|err| {
            tracing::error!("Error invalidating cache for key {}: {}", key, err);
        })
    }
}
