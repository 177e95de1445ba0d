//! Operator commands on top of the cache layer.

pub mod commands;
pub mod error;
