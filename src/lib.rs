//! Caching core for the Albion Raid Manager services.
//!
//! The crate exposes a read-through wrapper ([`cache::with_cache`]), the cache
//! key namespace ([`cache::CacheKeys`]), the store backends the API and bot
//! share, and the Albion item-name validator.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
