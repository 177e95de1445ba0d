//! Raid Manager cache system
//!
//! - **Keys**: [`CacheKeys`] computes the key for every cacheable entity,
//!   [`KeyPatterns`] the globs that invalidate one entity wholesale.
//! - **Stores**: [`CacheStore`] with an in-process LRU ([`MemoryStore`]) and a
//!   Redis backend ([`RedisStore`]).
//! - **Read-through**: [`with_cache`] runs a producer on a miss and writes the
//!   result back in the background. [`CacheContext`] holds the configured
//!   store, default TTL and single-flight coordinator for a process.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! backend = "redis"
//! redis_url = "redis://127.0.0.1:6379"
//! default_ttl_seconds = 300
//! single_flight = true
//! ```

mod backend;
mod config;
mod context;
mod error;
mod flight;
pub mod glob;
mod invalidate;
mod keys;
mod lock;
mod memory;
pub mod metrics;
mod read_through;
mod redis_store;
mod store;

pub use backend::build_store;
pub use config::{CacheBackend, CacheConfig};
pub use context::CacheContext;
pub use error::CacheError;
pub use flight::SingleFlight;
pub use invalidate::invalidate;
pub use keys::{
    CacheKeys, KEY_TAGS, KeyBuilder, KeyError, KeyPatterns, escape_component, escape_glob,
    hash_object,
};
pub use memory::MemoryStore;
pub use read_through::{CacheOptions, with_cache};
pub use redis_store::RedisStore;
pub use store::{CacheStore, SharedStore};
