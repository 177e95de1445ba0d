//! Redis-backed cache store.
//!
//! One `ConnectionManager` is created at startup and cloned per command; it
//! multiplexes over a single connection and reconnects on its own.

use std::num::NonZeroUsize;
use std::time::Duration;

use async_trait::async_trait;
use redis::{Client, aio::ConnectionManager};
use tracing::{debug, info};

use super::error::CacheError;
use super::glob::GlobPattern;
use super::store::{CacheStore, effective_ttl};

pub struct RedisStore {
    connection: ConnectionManager,
    scan_batch_size: NonZeroUsize,
}

impl RedisStore {
    pub async fn connect(url: &str, scan_batch_size: NonZeroUsize) -> Result<Self, CacheError> {
        let client = Client::open(url).map_err(|err| CacheError::backend("open", err))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|err| CacheError::backend("connect", err))?;

        info!(
            target = "raid_cache::redis",
            scan_batch_size = scan_batch_size.get(),
            "connected to redis"
        );

        Ok(Self {
            connection,
            scan_batch_size,
        })
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut connection = self.connection.clone();
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut connection)
            .await
            .map_err(|err| CacheError::backend("get", err))?;
        Ok(value)
    }

    async fn set(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let mut connection = self.connection.clone();
        let mut command = redis::cmd("SET");
        command.arg(key).arg(value);
        if let Some(ttl) = effective_ttl(ttl) {
            let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
            command.arg("PX").arg(millis);
        }

        let _: () = command
            .query_async(&mut connection)
            .await
            .map_err(|err| CacheError::backend("set", err))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let mut connection = self.connection.clone();
        let removed: u64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut connection)
            .await
            .map_err(|err| CacheError::backend("delete", err))?;
        Ok(removed > 0)
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        // Validate locally so both backends reject the same patterns.
        GlobPattern::compile(pattern)?;

        let mut connection = self.connection.clone();
        let mut cursor: u64 = 0;
        let mut removed = 0u64;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(self.scan_batch_size.get())
                .query_async(&mut connection)
                .await
                .map_err(|err| CacheError::backend("scan", err))?;

            if !keys.is_empty() {
                let deleted: u64 = redis::cmd("DEL")
                    .arg(&keys)
                    .query_async(&mut connection)
                    .await
                    .map_err(|err| CacheError::backend("delete_pattern", err))?;
                removed += deleted;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        debug!(pattern, removed, "redis pattern delete finished");
        Ok(removed)
    }
}
