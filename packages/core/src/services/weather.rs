//! Read-through weather lookup.
//!
//! Order of consultation for an ordinary lookup is cache, then store, then
//! the external source. A forced refresh skips the cache, invalidates the
//! cached entry and publishes a [`RefreshEvent`]; both of those side effects
//! are best-effort. The store is still read on a forced refresh, but its
//! answer is ignored.
//!
//! Concurrent forced refreshes for the same location are not coalesced.
//! Each one fetches and upserts; the store keeps whichever write lands last.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::CacheRepository;
use crate::error::AppError;
use crate::queue::publisher::EventPublisher;
use crate::repository::WeatherStore;
use crate::services::best_effort;
use crate::services::openweather::WeatherSource;
use crate::types::{cache_key, RefreshEvent, Source, WeatherRecord};

pub struct WeatherService {
    store: Arc<dyn WeatherStore + Send + Sync>,
    cache: CacheRepository,
    source: Arc<dyn WeatherSource + Send + Sync>,
    publisher: Arc<dyn EventPublisher + Send + Sync>,
    cache_ttl: Duration,
}

impl WeatherService {
    pub fn new(
        store: Arc<dyn WeatherStore + Send + Sync>,
        cache: CacheRepository,
        source: Arc<dyn WeatherSource + Send + Sync>,
        publisher: Arc<dyn EventPublisher + Send + Sync>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            source,
            publisher,
            cache_ttl,
        }
    }

    /// Current weather for `location`, or `None` if the external source
    /// does not know it.
    pub async fn get_weather(
        &self,
        location: &str,
        force_refresh: bool,
    ) -> Result<Option<WeatherRecord>, AppError> {
        let key = cache_key(location);

        if force_refresh {
            best_effort("cache invalidation", self.cache.invalidate(&key)).await;
            tracing::info!("Forcing refresh, invalidating cache for {}", location);

            let event = RefreshEvent::now(location);
            best_effort("refresh event publish", self.publisher.publish_refresh(&event)).await;
        } else if let Some(cached) = self.cache.get::<WeatherRecord>(&key).await? {
            tracing::info!("Serving weather data for {} from cache.", location);
            return Ok(Some(cached.with_source(Source::Cache)));
        }

        // Store errors fail a forced refresh as well; only the hit is ignored.
        match self.store.find_by_location(location).await? {
            Some(stored) if !force_refresh => {
                tracing::info!("Serving weather data for {} from store (cache miss).", location);
                self.cache.set(&key, &stored, self.cache_ttl).await?;
                return Ok(Some(stored.with_source(Source::External)));
            }
            _ => {}
        }

        tracing::info!("Fetching weather data for {} from external API.", location);
        let Some(fetched) = self.source.fetch_current(location).await? else {
            tracing::info!("External API has no weather data for {}", location);
            return Ok(None);
        };

        self.store.upsert(location, &fetched.observation()).await?;
        tracing::info!("Saved weather data for {} to store.", location);

        self.cache.set(&key, &fetched, self.cache_ttl).await?;
        tracing::info!("Cached weather data for {}.", location);

        Ok(Some(fetched.with_source(Source::External)))
    }
}
