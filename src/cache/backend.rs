//! Store construction from configuration.

use std::sync::Arc;

use tracing::info;

use super::config::{CacheBackend, CacheConfig};
use super::error::CacheError;
use super::memory::MemoryStore;
use super::redis_store::RedisStore;
use super::store::{CacheStore, SharedStore};

/// Build the process-wide store once at startup.
///
/// Returns `None` when caching is disabled; callers pass that straight into
/// [`CacheOptions::maybe_store`](super::CacheOptions::maybe_store).
pub async fn build_store(config: &CacheConfig) -> Result<Option<SharedStore>, CacheError> {
    let store: SharedStore = match config.backend {
        CacheBackend::Disabled => {
            info!(target = "raid_cache::cache", "cache disabled");
            return Ok(None);
        }
        CacheBackend::Memory => Arc::new(MemoryStore::from_config(config)),
        CacheBackend::Redis => {
            let url = config.redis_url.as_deref().ok_or_else(|| {
                CacheError::configuration("cache.redis_url is required for the redis backend")
            })?;
            Arc::new(RedisStore::connect(url, config.scan_batch_size_non_zero()).await?)
        }
    };

    info!(
        target = "raid_cache::cache",
        backend = store.backend(),
        "cache store ready"
    );
    Ok(Some(store))
}
