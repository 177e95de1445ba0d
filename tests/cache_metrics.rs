use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use metrics_util::debugging::DebuggingRecorder;
use raid_cache::cache::{
    CacheError, CacheKeys, CacheOptions, CacheStore, KeyPatterns, MemoryStore, SharedStore,
    SingleFlight, invalidate, with_cache,
};

/// Accepts reads, rejects every write.
struct ReadOnlyStore;

#[async_trait]
impl CacheStore for ReadOnlyStore {
    fn backend(&self) -> &'static str {
        "read-only"
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Option<Duration>) -> Result<(), CacheError> {
        Err(CacheError::backend("SET", "READONLY replica"))
    }

    async fn delete(&self, _key: &str) -> Result<bool, CacheError> {
        Ok(false)
    }

    async fn delete_pattern(&self, _pattern: &str) -> Result<u64, CacheError> {
        Ok(0)
    }
}

async fn produce(options: CacheOptions) -> u32 {
    with_cache(|| async { Ok::<_, CacheError>(7u32) }, options)
        .await
        .expect("producer value")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cache_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    // Passthrough
    produce(CacheOptions::new(CacheKeys::raid("1", None))).await;

    // Miss then hit, with a capacity of one forcing an eviction
    let memory = Arc::new(MemoryStore::new(NonZeroUsize::MIN));
    let store: SharedStore = memory.clone();
    let key = CacheKeys::raid("2", None);
    produce(CacheOptions::new(key.clone()).store(store.clone())).await;
    for _ in 0..100 {
        if memory.get(&key).await.expect("memory get").is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    produce(CacheOptions::new(key.clone()).store(store.clone())).await;
    memory
        .set(&CacheKeys::raid("3", None), "1".into(), None)
        .await
        .expect("evicting set");

    // Undecodable payload
    let garbage = CacheKeys::server("4", None);
    memory
        .set(&garbage, "{oops".into(), None)
        .await
        .expect("seed garbage");
    produce(CacheOptions::new(garbage).store(store.clone())).await;

    // Rejected write
    produce(CacheOptions::new(CacheKeys::build("5", None)).store(Arc::new(ReadOnlyStore))).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Coalesced miss
    let flight = SingleFlight::new();
    let coalesced = Arc::new(MemoryStore::new(NonZeroUsize::new(8).expect("capacity")));
    let calls = (0..2).map(|_| {
        let options = CacheOptions::new(CacheKeys::raid_slots("6"))
            .store(coalesced.clone())
            .single_flight(flight.clone());
        with_cache(
            || async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok::<_, CacheError>(6u32)
            },
            options,
        )
    });
    for result in join_all(calls).await {
        assert_eq!(result.expect("coalesced value"), 6);
    }

    // Invalidation
    let removed = invalidate(coalesced.as_ref(), &KeyPatterns::raid_all("6"))
        .await
        .expect("invalidate");
    assert_eq!(removed, 1);

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "raid_cache_hit_total",
        "raid_cache_miss_total",
        "raid_cache_coalesced_total",
        "raid_cache_passthrough_total",
        "raid_cache_read_error_total",
        "raid_cache_write_error_total",
        "raid_cache_invalidated_keys_total",
        "raid_cache_memory_evict_total",
        "raid_cache_memory_entries",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
