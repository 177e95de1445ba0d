//! In-process cache store.
//!
//! Bounded LRU with a per-entry expiry instant. Expired entries are dropped
//! lazily when read or when a pattern sweep walks over them.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use metrics::{counter, gauge};

use super::config::CacheConfig;
use super::error::CacheError;
use super::glob::GlobPattern;
use super::lock::lock_entries;
use super::metrics::{METRIC_MEMORY_ENTRIES, METRIC_MEMORY_EVICT};
use super::store::{CacheStore, effective_ttl};

const STORE: &str = "memory";

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

pub struct MemoryStore {
    entries: Mutex<LruCache<String, Entry>>,
}

impl MemoryStore {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.memory_capacity_non_zero())
    }

    /// Number of stored entries, expired ones included until they are swept.
    #[cfg(test)]
    fn len(&self) -> usize {
        lock_entries(&self.entries, STORE, "len").len()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        let mut entries = lock_entries(&self.entries, STORE, "get");

        match entries.get(key) {
            None => return Ok(None),
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
            Some(_) => {}
        }

        entries.pop(key);
        gauge!(METRIC_MEMORY_ENTRIES).set(entries.len() as f64);
        Ok(None)
    }

    async fn set(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let expires_at = effective_ttl(ttl).map(|ttl| Instant::now() + ttl);
        let mut entries = lock_entries(&self.entries, STORE, "set");

        let displaced = entries.push(key.to_string(), Entry { value, expires_at });
        if displaced.is_some_and(|(evicted, _)| evicted != key) {
            counter!(METRIC_MEMORY_EVICT).increment(1);
        }
        gauge!(METRIC_MEMORY_ENTRIES).set(entries.len() as f64);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let mut entries = lock_entries(&self.entries, STORE, "delete");
        let removed = entries.pop(key).is_some();
        gauge!(METRIC_MEMORY_ENTRIES).set(entries.len() as f64);
        Ok(removed)
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        let glob = GlobPattern::compile(pattern)?;
        let now = Instant::now();
        let mut entries = lock_entries(&self.entries, STORE, "delete_pattern");

        let mut matched = Vec::new();
        let mut expired = Vec::new();
        for (key, entry) in entries.iter() {
            if glob.matches(key) {
                matched.push(key.clone());
            } else if entry.is_expired(now) {
                expired.push(key.clone());
            }
        }

        let mut removed = 0u64;
        for key in &matched {
            if entries.pop(key.as_str()).is_some_and(|entry| !entry.is_expired(now)) {
                removed += 1;
            }
        }
        for key in &expired {
            entries.pop(key.as_str());
        }

        gauge!(METRIC_MEMORY_ENTRIES).set(entries.len() as f64);
        Ok(removed)
    }
}
