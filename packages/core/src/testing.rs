//! In-process doubles for every port, shared by unit tests and the
//! integration tests under `tests/`.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::cache::{CacheBackend, MokaCache};
use crate::error::AppError;
use crate::notification::NotificationSender;
use crate::queue::consumer::InboundMessage;
use crate::queue::publisher::EventPublisher;
use crate::repository::WeatherStore;
use crate::services::openweather::WeatherSource;
use crate::types::{RefreshEvent, Source, WeatherObservation, WeatherRecord};

// ---- Store ------------------------------------------------------------------

/// HashMap-backed [`WeatherStore`] keyed by lowercase location.
#[derive(Default)]
pub struct InMemoryWeatherStore {
    records: Mutex<HashMap<String, WeatherRecord>>,
    find_calls: AtomicUsize,
    upsert_calls: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl InMemoryWeatherStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl WeatherStore for InMemoryWeatherStore {
    async fn find_by_location(&self, location: &str) -> Result<Option<WeatherRecord>, AppError> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::Store(sqlx::Error::PoolTimedOut));
        }
        let records = self.records.lock().expect("store lock poisoned");
        Ok(records.get(&location.to_lowercase()).cloned())
    }

    async fn upsert(
        &self,
        location: &str,
        observation: &WeatherObservation,
    ) -> Result<WeatherRecord, AppError> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Store(sqlx::Error::PoolTimedOut));
        }
        let record =
            WeatherRecord::from_observation(location, observation.clone(), Source::External);
        self.records
            .lock()
            .expect("store lock poisoned")
            .insert(location.to_lowercase(), record.clone());
        Ok(record)
    }
}

// ---- Cache ------------------------------------------------------------------

/// [`MokaCache`] wrapper that counts writes and can be told to fail.
#[derive(Default)]
pub struct CountingCache {
    inner: MokaCache,
    set_calls: AtomicUsize,
    invalidate_calls: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_invalidations: AtomicBool,
}

impl CountingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The wrapped cache, for seeding and inspection without counting.
    pub fn inner(&self) -> &MokaCache {
        &self.inner
    }

    pub fn set_calls(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
    }

    pub fn invalidate_calls(&self) -> usize {
        self.invalidate_calls.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn fail_invalidations(&self) {
        self.fail_invalidations.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl CacheBackend for CountingCache {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::Cache("connection refused".into()));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), AppError> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Cache("connection refused".into()));
        }
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.invalidate_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_invalidations.load(Ordering::SeqCst) {
            return Err(AppError::Cache("connection refused".into()));
        }
        self.inner.delete(key).await
    }
}

// ---- External source --------------------------------------------------------

/// Replays queued responses in order.
#[derive(Default)]
pub struct ScriptedSource {
    responses: Mutex<VecDeque<Result<Option<WeatherRecord>, AppError>>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_with(&self, response: Result<Option<WeatherRecord>, AppError>) {
        self.responses
            .lock()
            .expect("source lock poisoned")
            .push_back(response);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherSource for ScriptedSource {
    async fn fetch_current(&self, _location: &str) -> Result<Option<WeatherRecord>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .expect("source lock poisoned")
            .pop_front()
            .unwrap_or_else(|| Err(AppError::Upstream("No scripted response configured".into())))
    }
}

// ---- Publisher --------------------------------------------------------------

#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<RefreshEvent>>,
    attempts: AtomicUsize,
    fail: AtomicBool,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_publishes(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    /// Successfully published events.
    pub fn events(&self) -> Vec<RefreshEvent> {
        self.events.lock().expect("publisher lock poisoned").clone()
    }

    /// Every publish call, including failed ones.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish_refresh(&self, event: &RefreshEvent) -> Result<(), AppError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Queue("channel closed".into()));
        }
        self.events
            .lock()
            .expect("publisher lock poisoned")
            .push(event.clone());
        Ok(())
    }
}

// ---- Notifier ---------------------------------------------------------------

pub struct ScriptedNotifier {
    fail: bool,
    locations: Mutex<Vec<String>>,
}

impl ScriptedNotifier {
    pub fn succeeding() -> Self {
        Self {
            fail: false,
            locations: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            locations: Mutex::new(Vec::new()),
        }
    }

    /// Every location the notifier was invoked with, in order.
    pub fn locations(&self) -> Vec<String> {
        self.locations.lock().expect("notifier lock poisoned").clone()
    }
}

#[async_trait]
impl NotificationSender for ScriptedNotifier {
    async fn send_refresh_notification(&self, location: &str) -> Result<(), AppError> {
        self.locations
            .lock()
            .expect("notifier lock poisoned")
            .push(location.to_string());
        if self.fail {
            return Err(AppError::Notification("Email sending failed".into()));
        }
        Ok(())
    }
}

// ---- Inbound message --------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordedSettlement {
    Ack,
    NackRequeue,
}

/// A broker delivery stand-in that records how it was settled.
pub struct RecordingMessage {
    body: Vec<u8>,
    settlements: Mutex<Vec<RecordedSettlement>>,
    fail_settlement: bool,
}

impl RecordingMessage {
    pub fn new(body: &[u8]) -> Self {
        Self {
            body: body.to_vec(),
            settlements: Mutex::new(Vec::new()),
            fail_settlement: false,
        }
    }

    /// Make ack/nack report a broker failure.
    pub fn failing_settlement(mut self) -> Self {
        self.fail_settlement = true;
        self
    }

    pub fn settlements(&self) -> Vec<RecordedSettlement> {
        self.settlements.lock().expect("message lock poisoned").clone()
    }

    fn settle(&self, settlement: RecordedSettlement) -> Result<(), AppError> {
        if self.fail_settlement {
            return Err(AppError::Queue("channel closed".into()));
        }
        self.settlements
            .lock()
            .expect("message lock poisoned")
            .push(settlement);
        Ok(())
    }
}

#[async_trait]
impl InboundMessage for RecordingMessage {
    fn body(&self) -> &[u8] {
        &self.body
    }

    async fn ack(&self) -> Result<(), AppError> {
        self.settle(RecordedSettlement::Ack)
    }

    async fn nack_requeue(&self) -> Result<(), AppError> {
        self.settle(RecordedSettlement::NackRequeue)
    }
}

/// Lets a test keep a handle on a message after handing it to a stream.
#[async_trait]
impl InboundMessage for Arc<RecordingMessage> {
    fn body(&self) -> &[u8] {
        &self.body
    }

    async fn ack(&self) -> Result<(), AppError> {
        self.settle(RecordedSettlement::Ack)
    }

    async fn nack_requeue(&self) -> Result<(), AppError> {
        self.settle(RecordedSettlement::NackRequeue)
    }
}
