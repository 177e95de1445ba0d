//! Per-key miss coalescing.
//!
//! Callers that miss on the same key queue behind one async lock; the first
//! one produces and writes, the rest re-read the store once it releases.
//! The slot remembers that a production already ran, so when its result was
//! not cached the remaining callers produce side by side instead of queuing.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// The guarded flag is set once a holder has run the producer.
type Slot = Arc<Mutex<bool>>;

#[derive(Clone, Default)]
pub struct SingleFlight {
    slots: Arc<DashMap<String, Slot>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other caller is producing `key`.
    pub(crate) async fn acquire(&self, key: &str) -> FlightGuard {
        let slot = self.slots.entry(key.to_owned()).or_default().value().clone();
        let guard = slot.lock_owned().await;
        FlightGuard {
            slots: Arc::clone(&self.slots),
            key: key.to_owned(),
            guard,
        }
    }

    /// Number of keys with a producer running or callers waiting.
    pub fn in_flight(&self) -> usize {
        self.slots.len()
    }
}

impl std::fmt::Debug for SingleFlight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlight")
            .field("in_flight", &self.slots.len())
            .finish()
    }
}

pub(crate) struct FlightGuard {
    slots: Arc<DashMap<String, Slot>>,
    key: String,
    guard: OwnedMutexGuard<bool>,
}

impl FlightGuard {
    /// True when an earlier holder of this slot already ran the producer.
    pub(crate) fn produced(&self) -> bool {
        *self.guard
    }

    pub(crate) fn mark_produced(&mut self) {
        *self.guard = true;
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        // The map and this guard hold the only references when nobody waits.
        self.slots
            .remove_if(&self.key, |_, slot| Arc::strong_count(slot) == 2);
    }
}
