//! Cache store contract.
//!
//! Stores hold JSON-encoded payloads keyed by [`CacheKeys`](super::CacheKeys)
//! strings. The read-through wrapper only needs `get` and `set`; pattern
//! deletion is used by writers invalidating whole entities.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::error::CacheError;

/// Minimal key/value contract shared by every backend.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Short backend identifier used in logs.
    fn backend(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value` under `key`, replacing any previous entry.
    ///
    /// `None` (or a zero duration) keeps the entry until the backend evicts it.
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>)
    -> Result<(), CacheError>;

    /// Remove a single key, returning whether it existed.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Remove every key matching a glob `pattern`, returning how many were removed.
    async fn delete_pattern(&self, pattern: &str) -> Result<u64, CacheError>;
}

/// Shared handle passed down to call sites.
pub type SharedStore = Arc<dyn CacheStore>;

/// Normalise a requested TTL: zero means "no expiry".
pub(crate) fn effective_ttl(ttl: Option<Duration>) -> Option<Duration> {
    ttl.filter(|ttl| !ttl.is_zero())
}
