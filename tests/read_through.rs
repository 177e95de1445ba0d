//! Read-through behavior against in-process stores.
//!
//! - Passthrough when no store is configured.
//! - Miss, hit and background write-back on the memory store.
//! - Store failures never change what the caller receives.
//! - Optional single-flight coalescing of concurrent misses.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use raid_cache::cache::{
    CacheError, CacheKeys, CacheOptions, CacheStore, MemoryStore, SharedStore, SingleFlight,
    with_cache,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Raid {
    id: String,
    title: String,
    slots: u32,
}

fn sample_raid(id: &str) -> Raid {
    Raid {
        id: id.to_string(),
        title: "Castle run".to_string(),
        slots: 20,
    }
}

fn memory_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new(NonZeroUsize::new(64).expect("capacity")))
}

async fn wait_for_entry(store: &MemoryStore, key: &str) -> String {
    for _ in 0..100 {
        if let Some(raw) = store.get(key).await.expect("memory get") {
            return raw;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("background write for `{key}` never landed");
}

/// Store whose operations can be made to fail; counts every call.
#[derive(Default)]
struct FlakyStore {
    inner: Option<Arc<MemoryStore>>,
    fail_get: bool,
    fail_set: bool,
    calls: AtomicUsize,
}

#[async_trait]
impl CacheStore for FlakyStore {
    fn backend(&self) -> &'static str {
        "flaky"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_get {
            return Err(CacheError::backend("GET", "connection reset"));
        }
        match &self.inner {
            Some(inner) => inner.get(key).await,
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_set {
            return Err(CacheError::backend("SET", "read only replica"));
        }
        match &self.inner {
            Some(inner) => inner.set(key, value, ttl).await,
            None => Ok(()),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.inner {
            Some(inner) => inner.delete(key).await,
            None => Ok(false),
        }
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.inner {
            Some(inner) => inner.delete_pattern(pattern).await,
            None => Ok(0),
        }
    }
}

#[tokio::test]
async fn passthrough_without_store_runs_producer_every_time() {
    let produced = AtomicUsize::new(0);
    let key = CacheKeys::raid("1", None);

    for _ in 0..3 {
        let raid: Result<Raid, CacheError> = with_cache(
            || async {
                produced.fetch_add(1, Ordering::SeqCst);
                Ok(sample_raid("1"))
            },
            CacheOptions::new(key.clone()).maybe_store(None),
        )
        .await;
        assert_eq!(raid.expect("producer value"), sample_raid("1"));
    }

    assert_eq!(produced.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn miss_writes_back_and_next_call_hits() {
    let store = memory_store();
    let shared: SharedStore = store.clone();
    let key = CacheKeys::raid("7", Some("signups"));
    let produced = AtomicUsize::new(0);

    let first: Result<Raid, CacheError> = with_cache(
        || async {
            produced.fetch_add(1, Ordering::SeqCst);
            Ok(sample_raid("7"))
        },
        CacheOptions::new(key.clone())
            .store(shared.clone())
            .ttl_seconds(60),
    )
    .await;
    assert_eq!(first.expect("miss value"), sample_raid("7"));

    let raw = wait_for_entry(&store, &key).await;
    let cached: Raid = serde_json::from_str(&raw).expect("cached json");
    assert_eq!(cached, sample_raid("7"));

    let second: Result<Raid, CacheError> = with_cache(
        || async {
            produced.fetch_add(1, Ordering::SeqCst);
            Ok(sample_raid("other"))
        },
        CacheOptions::new(key.clone()).store(shared),
    )
    .await;
    assert_eq!(second.expect("hit value"), sample_raid("7"));
    assert_eq!(produced.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn seeded_entry_skips_producer() {
    let store = memory_store();
    let key = CacheKeys::build("3", None);
    store
        .set(
            &key,
            serde_json::to_string(&sample_raid("seed")).expect("encode"),
            None,
        )
        .await
        .expect("seed");

    let produced = AtomicUsize::new(0);
    let value: Result<Raid, CacheError> = with_cache(
        || async {
            produced.fetch_add(1, Ordering::SeqCst);
            Ok(sample_raid("fresh"))
        },
        CacheOptions::new(key).store(store),
    )
    .await;

    assert_eq!(value.expect("hit"), sample_raid("seed"));
    assert_eq!(produced.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn undecodable_entry_falls_through_to_producer() {
    let store = memory_store();
    let key = CacheKeys::server("9", None);
    store
        .set(&key, "{not json".into(), None)
        .await
        .expect("seed");

    let value: Result<Raid, CacheError> = with_cache(
        || async { Ok(sample_raid("9")) },
        CacheOptions::new(key).store(store),
    )
    .await;

    assert_eq!(value.expect("producer value"), sample_raid("9"));
}

#[tokio::test]
async fn cached_null_counts_as_miss_and_is_not_written() {
    let store = memory_store();
    let key = CacheKeys::user("42", None);
    store.set(&key, "null".into(), None).await.expect("seed");

    let produced = AtomicUsize::new(0);
    let value: Result<Option<Raid>, CacheError> = with_cache(
        || async {
            produced.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        },
        CacheOptions::new(key.clone()).store(store.clone()),
    )
    .await;

    assert_eq!(value.expect("producer value"), None);
    assert_eq!(produced.load(Ordering::SeqCst), 1);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(
        store.get(&key).await.expect("get").as_deref(),
        Some("null"),
        "a null result must not overwrite the entry"
    );
}

#[tokio::test]
async fn failing_reads_fall_through_to_producer() {
    let store = Arc::new(FlakyStore {
        fail_get: true,
        ..Default::default()
    });

    let value: Result<Raid, CacheError> = with_cache(
        || async { Ok(sample_raid("1")) },
        CacheOptions::new(CacheKeys::raid("1", None)).store(store.clone()),
    )
    .await;

    assert_eq!(value.expect("producer value"), sample_raid("1"));
    assert!(store.calls.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn failing_writes_do_not_surface() {
    let store = Arc::new(FlakyStore {
        fail_set: true,
        ..Default::default()
    });

    let value: Result<Raid, CacheError> = with_cache(
        || async { Ok(sample_raid("2")) },
        CacheOptions::new(CacheKeys::raid("2", None)).store(store.clone()),
    )
    .await;

    assert_eq!(value.expect("producer value"), sample_raid("2"));
}

#[derive(Debug, PartialEq)]
struct LookupFailed(&'static str);

#[tokio::test]
async fn producer_errors_propagate_and_nothing_is_cached() {
    let store = memory_store();
    let key = CacheKeys::server_raids("1", None);

    let value: Result<Raid, LookupFailed> = with_cache(
        || async { Err(LookupFailed("database unavailable")) },
        CacheOptions::new(key.clone()).store(store.clone()),
    )
    .await;

    assert_eq!(value, Err(LookupFailed("database unavailable")));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(store.get(&key).await.expect("get").is_none());
}

#[tokio::test]
async fn passthrough_returns_producer_error_unchanged() {
    let produced = AtomicUsize::new(0);
    let value: Result<Raid, LookupFailed> = with_cache(
        || async {
            produced.fetch_add(1, Ordering::SeqCst);
            Err(LookupFailed("guild not found"))
        },
        CacheOptions::new(CacheKeys::server("404", None)).maybe_store(None),
    )
    .await;

    assert_eq!(value, Err(LookupFailed("guild not found")));
    assert_eq!(produced.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn producer_is_not_retried_after_error() {
    let produced = AtomicUsize::new(0);
    let value: Result<Raid, LookupFailed> = with_cache(
        || async {
            produced.fetch_add(1, Ordering::SeqCst);
            Err(LookupFailed("boom"))
        },
        CacheOptions::new(CacheKeys::raid("4", None)).store(memory_store()),
    )
    .await;

    assert!(value.is_err());
    assert_eq!(produced.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_flight_coalesces_concurrent_misses() {
    let store = memory_store();
    let shared: SharedStore = store.clone();
    let flight = SingleFlight::new();
    let produced = Arc::new(AtomicUsize::new(0));
    let key = CacheKeys::raid_slots("11");

    let calls = (0..8).map(|_| {
        let produced = Arc::clone(&produced);
        let options = CacheOptions::new(key.clone())
            .store(shared.clone())
            .single_flight(flight.clone());
        async move {
            with_cache(
                || async move {
                    produced.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    Ok::<_, CacheError>(sample_raid("11"))
                },
                options,
            )
            .await
        }
    });

    let results = join_all(calls).await;
    for result in results {
        assert_eq!(result.expect("value"), sample_raid("11"));
    }
    assert_eq!(produced.load(Ordering::SeqCst), 1);
    assert_eq!(flight.in_flight(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_flight_does_not_serialize_uncached_results() {
    let store: SharedStore = memory_store();
    let flight = SingleFlight::new();
    let produced = Arc::new(AtomicUsize::new(0));
    let key = CacheKeys::server_member("1", "404");

    let started = Instant::now();
    let calls = (0..5).map(|_| {
        let produced = Arc::clone(&produced);
        let options = CacheOptions::new(key.clone())
            .store(store.clone())
            .single_flight(flight.clone());
        async move {
            with_cache(
                || async move {
                    produced.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(60)).await;
                    Ok::<Option<Raid>, CacheError>(None)
                },
                options,
            )
            .await
        }
    });

    for result in join_all(calls).await {
        assert_eq!(result.expect("value"), None);
    }
    let elapsed = started.elapsed();

    // One leader run, then the remaining callers side by side; queued would be ~300ms.
    assert_eq!(produced.load(Ordering::SeqCst), 5);
    assert!(
        elapsed < Duration::from_millis(240),
        "uncached results were produced one after another: {elapsed:?}"
    );
    assert_eq!(flight.in_flight(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_flight_followers_bypass_after_leader_error() {
    let store: SharedStore = memory_store();
    let flight = SingleFlight::new();
    let produced = Arc::new(AtomicUsize::new(0));
    let key = CacheKeys::raid("13", None);

    let started = Instant::now();
    let calls = (0..4).map(|index| {
        let produced = Arc::clone(&produced);
        let options = CacheOptions::new(key.clone())
            .store(store.clone())
            .single_flight(flight.clone());
        async move {
            with_cache(
                || async move {
                    produced.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(60)).await;
                    if index == 0 {
                        Err(LookupFailed("timeout"))
                    } else {
                        Ok(sample_raid("13"))
                    }
                },
                options,
            )
            .await
        }
    });

    let results = join_all(calls).await;
    assert_eq!(results[0], Err(LookupFailed("timeout")));
    assert!(started.elapsed() < Duration::from_millis(200));
    assert!(produced.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn without_single_flight_concurrent_misses_each_produce() {
    let store: SharedStore = memory_store();
    let produced = Arc::new(AtomicUsize::new(0));
    let key = CacheKeys::raid_slots("12");

    let calls = (0..3).map(|_| {
        let produced = Arc::clone(&produced);
        let options = CacheOptions::new(key.clone()).store(store.clone());
        async move {
            with_cache(
                || async move {
                    produced.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok::<_, CacheError>(sample_raid("12"))
                },
                options,
            )
            .await
        }
    });

    for result in join_all(calls).await {
        assert!(result.is_ok());
    }
    assert_eq!(produced.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn expired_entries_are_produced_again() {
    let store = memory_store();
    let key = CacheKeys::item("T4_MAIN_SWORD");
    let produced = AtomicUsize::new(0);

    let options = || {
        CacheOptions::new(key.clone())
            .store(store.clone())
            .ttl(Duration::from_millis(30))
    };

    let _: Raid = with_cache(
        || async {
            produced.fetch_add(1, Ordering::SeqCst);
            Ok::<_, CacheError>(sample_raid("a"))
        },
        options(),
    )
    .await
    .expect("first");
    wait_for_entry(&store, &key).await;
    tokio::time::sleep(Duration::from_millis(60)).await;

    let _: Raid = with_cache(
        || async {
            produced.fetch_add(1, Ordering::SeqCst);
            Ok::<_, CacheError>(sample_raid("b"))
        },
        options(),
    )
    .await
    .expect("second");

    assert_eq!(produced.load(Ordering::SeqCst), 2);
}
