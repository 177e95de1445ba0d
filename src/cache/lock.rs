use std::sync::{Mutex, MutexGuard};

use tracing::warn;

/// Lock a store's entry table, carrying on with the inner value if a previous
/// holder panicked.
pub(crate) fn lock_entries<'a, T>(
    entries: &'a Mutex<T>,
    store: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    entries.lock().unwrap_or_else(|poisoned| {
        warn!(store, op, "cache store lock was poisoned, continuing with existing entries");
        poisoned.into_inner()
    })
}
