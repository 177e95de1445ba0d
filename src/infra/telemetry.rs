use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::cache::metrics::{
    METRIC_CACHE_COALESCED, METRIC_CACHE_HIT, METRIC_CACHE_INVALIDATED, METRIC_CACHE_MISS,
    METRIC_CACHE_PASSTHROUGH, METRIC_CACHE_READ_ERROR, METRIC_CACHE_WRITE_ERROR,
    METRIC_MEMORY_ENTRIES, METRIC_MEMORY_EVICT,
};
use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
///
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

/// Register descriptions for every cache metric; safe to call repeatedly.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_CACHE_HIT,
            Unit::Count,
            "Total number of read-through cache hits."
        );
        describe_counter!(
            METRIC_CACHE_MISS,
            Unit::Count,
            "Total number of read-through cache misses that ran the producer."
        );
        describe_counter!(
            METRIC_CACHE_COALESCED,
            Unit::Count,
            "Total number of misses served by a concurrent caller's production."
        );
        describe_counter!(
            METRIC_CACHE_PASSTHROUGH,
            Unit::Count,
            "Total number of calls made without a configured store."
        );
        describe_counter!(
            METRIC_CACHE_READ_ERROR,
            Unit::Count,
            "Total number of store reads that failed or returned undecodable payloads."
        );
        describe_counter!(
            METRIC_CACHE_WRITE_ERROR,
            Unit::Count,
            "Total number of cache writes that failed to encode or persist."
        );
        describe_counter!(
            METRIC_CACHE_INVALIDATED,
            Unit::Count,
            "Total number of keys removed by pattern invalidation."
        );
        describe_counter!(
            METRIC_MEMORY_EVICT,
            Unit::Count,
            "Total number of in-memory entries evicted due to capacity."
        );
        describe_gauge!(
            METRIC_MEMORY_ENTRIES,
            Unit::Count,
            "Current number of entries held by the in-memory store."
        );
    });
}
