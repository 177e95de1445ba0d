//! Cache configuration.
//!
//! Selects the store backend and the defaults applied by callers, resolved
//! from `[cache]` in `raid-cache.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

// Default values for cache configuration
const DEFAULT_MEMORY_CAPACITY: usize = 10_000;
const DEFAULT_TTL_SECONDS: u64 = 300;
const DEFAULT_SCAN_BATCH_SIZE: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Memory,
    Redis,
    Disabled,
}

impl CacheBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheBackend::Memory => "memory",
            CacheBackend::Redis => "redis",
            CacheBackend::Disabled => "disabled",
        }
    }
}

impl std::str::FromStr for CacheBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(CacheBackend::Memory),
            "redis" => Ok(CacheBackend::Redis),
            "disabled" | "none" | "off" => Ok(CacheBackend::Disabled),
            other => Err(format!(
                "unknown cache backend `{other}` (expected memory, redis or disabled)"
            )),
        }
    }
}

/// Cache configuration from `raid-cache.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Which store backs the cache.
    pub backend: CacheBackend,
    /// Connection URL, required when `backend = "redis"`.
    pub redis_url: Option<String>,
    /// Maximum entries held by the in-memory store.
    pub memory_capacity: usize,
    /// TTL applied by callers that do not pick their own; `0` disables expiry.
    pub default_ttl_seconds: u64,
    /// Coalesce concurrent misses on the same key.
    pub single_flight: bool,
    /// Keys requested per `SCAN` round trip during pattern deletion.
    pub scan_batch_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            redis_url: None,
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            default_ttl_seconds: DEFAULT_TTL_SECONDS,
            single_flight: false,
            scan_batch_size: DEFAULT_SCAN_BATCH_SIZE,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            backend: settings.backend,
            redis_url: settings.redis_url.clone(),
            memory_capacity: settings.memory_capacity.get(),
            default_ttl_seconds: settings.default_ttl_seconds,
            single_flight: settings.single_flight,
            scan_batch_size: settings.scan_batch_size.get(),
        }
    }
}

impl CacheConfig {
    /// Returns the default TTL, `None` when expiry is disabled.
    pub fn default_ttl(&self) -> Option<Duration> {
        (self.default_ttl_seconds > 0).then(|| Duration::from_secs(self.default_ttl_seconds))
    }

    /// Returns the memory capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn memory_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.memory_capacity).unwrap_or(NonZeroUsize::MIN)
    }

    /// Returns the SCAN batch size as NonZeroUsize, clamping to 1 if zero.
    pub fn scan_batch_size_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.scan_batch_size).unwrap_or(NonZeroUsize::MIN)
    }
}
