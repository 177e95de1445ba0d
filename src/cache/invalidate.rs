//! Pattern-based bulk invalidation.

use metrics::counter;
use tracing::{debug, instrument};

use super::error::CacheError;
use super::metrics::METRIC_CACHE_INVALIDATED;
use super::store::CacheStore;

/// Delete every key matching any of `patterns`, returning the total removed.
///
/// Stops at the first store error; keys removed before it stay removed.
#[instrument(skip_all, fields(backend = store.backend(), patterns = patterns.len()))]
pub async fn invalidate<S>(store: &S, patterns: &[String]) -> Result<u64, CacheError>
where
    S: CacheStore + ?Sized,
{
    let mut removed = 0u64;
    for pattern in patterns {
        let count = store.delete_pattern(pattern).await?;
        debug!(pattern = %pattern, removed = count, "pattern invalidated");
        removed += count;
    }

    counter!(METRIC_CACHE_INVALIDATED).increment(removed);
    Ok(removed)
}
