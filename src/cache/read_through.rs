//! Read-through cache wrapper.
//!
//! [`with_cache`] consults the store before running a producer and writes the
//! produced value back without making the caller wait for it. The producer is
//! authoritative: store failures never turn a successful production into an
//! error, and producer errors are returned untouched.

use std::future::Future;
use std::time::Duration;

use metrics::counter;
use serde::{Serialize, de::DeserializeOwned};
use tokio::runtime::Handle;
use tracing::{Instrument, debug, instrument, warn};

use super::flight::SingleFlight;
use super::metrics::{
    METRIC_CACHE_COALESCED, METRIC_CACHE_HIT, METRIC_CACHE_MISS, METRIC_CACHE_PASSTHROUGH,
    METRIC_CACHE_READ_ERROR, METRIC_CACHE_WRITE_ERROR,
};
use super::store::{CacheStore, SharedStore};

/// Stored JSON `null` is indistinguishable from "nothing cached".
const NULL_PAYLOAD: &str = "null";

/// Options for a single [`with_cache`] call.
#[derive(Clone)]
pub struct CacheOptions {
    store: Option<SharedStore>,
    key: String,
    ttl: Option<Duration>,
    single_flight: Option<SingleFlight>,
}

impl CacheOptions {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            store: None,
            key: key.into(),
            ttl: None,
            single_flight: None,
        }
    }

    pub fn store(mut self, store: SharedStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Attach a store when one is configured; `None` keeps the call a passthrough.
    pub fn maybe_store(mut self, store: Option<SharedStore>) -> Self {
        self.store = store;
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn ttl_seconds(self, seconds: u64) -> Self {
        self.ttl(Duration::from_secs(seconds))
    }

    pub fn maybe_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn single_flight(mut self, flight: SingleFlight) -> Self {
        self.single_flight = Some(flight);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// TTL the write-back will use; `None` keeps the entry until evicted.
    pub fn expiry(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    pub fn coalesces(&self) -> bool {
        self.single_flight.is_some()
    }
}

impl std::fmt::Debug for CacheOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheOptions")
            .field("store", &self.store.as_ref().map(|store| store.backend()))
            .field("key", &self.key)
            .field("ttl", &self.ttl)
            .field("single_flight", &self.single_flight.is_some())
            .finish()
    }
}

/// Run `producer` unless `options` names a store that already holds the key.
pub async fn with_cache<T, E, F, Fut>(producer: F, options: CacheOptions) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    T: Serialize + DeserializeOwned,
{
    let CacheOptions {
        store,
        key,
        ttl,
        single_flight,
    } = options;

    let Some(store) = store else {
        counter!(METRIC_CACHE_PASSTHROUGH).increment(1);
        return producer().await;
    };

    read_through(producer, store, key, ttl, single_flight).await
}

#[instrument(skip_all, fields(key = %key, backend = store.backend()))]
async fn read_through<T, E, F, Fut>(
    producer: F,
    store: SharedStore,
    key: String,
    ttl: Option<Duration>,
    single_flight: Option<SingleFlight>,
) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    T: Serialize + DeserializeOwned,
{
    if let Some(value) = lookup(store.as_ref(), &key).await {
        counter!(METRIC_CACHE_HIT).increment(1);
        debug!(outcome = "hit", "serving cached value");
        return Ok(value);
    }

    let Some(flight) = single_flight else {
        debug!(outcome = "miss", "running producer");
        return produce_and_spawn_write(producer, store, key, ttl).await;
    };

    let mut slot = flight.acquire(&key).await;
    if let Some(value) = lookup(store.as_ref(), &key).await {
        counter!(METRIC_CACHE_COALESCED).increment(1);
        debug!(outcome = "coalesced", "value produced by concurrent caller");
        return Ok(value);
    }

    if slot.produced() {
        // An earlier holder produced without caching; run outside the slot.
        drop(slot);
        debug!(outcome = "miss", "previous production left nothing cached");
        return produce_and_spawn_write(producer, store, key, ttl).await;
    }

    counter!(METRIC_CACHE_MISS).increment(1);
    debug!(outcome = "miss", "running producer");
    // Set before producing so followers bypass the slot on error or cancellation too.
    slot.mark_produced();
    let value = producer().await?;
    // Followers re-read as soon as the slot is released, so write before returning.
    if let Some(payload) = encode(&key, &value) {
        write(store.as_ref(), &key, payload, ttl).await;
    }
    Ok(value)
}

async fn produce_and_spawn_write<T, E, F, Fut>(
    producer: F,
    store: SharedStore,
    key: String,
    ttl: Option<Duration>,
) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    T: Serialize,
{
    counter!(METRIC_CACHE_MISS).increment(1);
    let value = producer().await?;
    if let Some(payload) = encode(&key, &value) {
        spawn_write(store, key, payload, ttl).await;
    }
    Ok(value)
}

async fn lookup<T: DeserializeOwned>(store: &dyn CacheStore, key: &str) -> Option<T> {
    let raw = match store.get(key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(err) => {
            counter!(METRIC_CACHE_READ_ERROR).increment(1);
            warn!(key, error = %err, "cache read failed, treating as miss");
            return None;
        }
    };

    if raw.trim() == NULL_PAYLOAD {
        return None;
    }

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(err) => {
            counter!(METRIC_CACHE_READ_ERROR).increment(1);
            warn!(key, error = %err, "cached value could not be decoded, treating as miss");
            None
        }
    }
}

fn encode<T: Serialize>(key: &str, value: &T) -> Option<String> {
    match serde_json::to_string(value) {
        Ok(payload) if payload == NULL_PAYLOAD => None,
        Ok(payload) => Some(payload),
        Err(err) => {
            counter!(METRIC_CACHE_WRITE_ERROR).increment(1);
            warn!(key, error = %err, "failed to encode value for cache");
            None
        }
    }
}

async fn write(store: &dyn CacheStore, key: &str, payload: String, ttl: Option<Duration>) {
    if let Err(err) = store.set(key, payload, ttl).await {
        counter!(METRIC_CACHE_WRITE_ERROR).increment(1);
        warn!(key, error = %err, "cache write failed");
    }
}

/// Hand the write to the runtime; without a Tokio runtime it is awaited inline.
async fn spawn_write(store: SharedStore, key: String, payload: String, ttl: Option<Duration>) {
    match Handle::try_current() {
        Ok(handle) => {
            let span = tracing::Span::current();
            handle.spawn(
                async move {
                    write(store.as_ref(), &key, payload, ttl).await;
                }
                .instrument(span),
            );
        }
        Err(_) => write(store.as_ref(), &key, payload, ttl).await,
    }
}
