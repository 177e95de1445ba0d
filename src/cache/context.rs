//! Process-wide cache handle built from configuration.
//!
//! Services hold one [`CacheContext`] and ask it for per-call
//! [`CacheOptions`]; the configured default TTL and single-flight
//! coordinator are applied there.

use std::time::Duration;

use super::backend::build_store;
use super::config::CacheConfig;
use super::error::CacheError;
use super::flight::SingleFlight;
use super::read_through::CacheOptions;
use super::store::SharedStore;

#[derive(Clone)]
pub struct CacheContext {
    store: Option<SharedStore>,
    default_ttl: Option<Duration>,
    flight: Option<SingleFlight>,
}

impl CacheContext {
    /// Connect the configured backend and capture the call defaults.
    pub async fn connect(config: &CacheConfig) -> Result<Self, CacheError> {
        let store = build_store(config).await?;
        Ok(Self::with_store(store, config))
    }

    /// Wrap an already-built store (or none) with the defaults from `config`.
    pub fn with_store(store: Option<SharedStore>, config: &CacheConfig) -> Self {
        Self {
            store,
            default_ttl: config.default_ttl(),
            flight: config.single_flight.then(SingleFlight::new),
        }
    }

    pub fn store(&self) -> Option<&SharedStore> {
        self.store.as_ref()
    }

    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    pub fn single_flight(&self) -> Option<&SingleFlight> {
        self.flight.as_ref()
    }

    /// Options for one `with_cache` call on `key` using the configured defaults.
    ///
    /// Callers may still override the TTL on the returned value.
    pub fn options(&self, key: impl Into<String>) -> CacheOptions {
        let options = CacheOptions::new(key)
            .maybe_store(self.store.clone())
            .maybe_ttl(self.default_ttl);
        match &self.flight {
            Some(flight) => options.single_flight(flight.clone()),
            None => options,
        }
    }
}

impl std::fmt::Debug for CacheContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheContext")
            .field("store", &self.store.as_ref().map(|store| store.backend()))
            .field("default_ttl", &self.default_ttl)
            .field("single_flight", &self.flight)
            .finish()
    }
}
