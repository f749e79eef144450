use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::cache::metric;
use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
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

/// Register descriptions for every metric the cache layer emits.
///
/// Safe to call repeatedly; only the first call reaches the recorder.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(metric::HIT, Unit::Count, "Total number of cache hits.");
        describe_counter!(
            metric::MISS,
            Unit::Count,
            "Total number of cache misses that ran the producer."
        );
        describe_counter!(
            metric::DEGRADED,
            Unit::Count,
            "Total number of reads served by the producer because the store failed."
        );
        describe_counter!(
            metric::STORE_ERROR,
            Unit::Count,
            "Total number of failed or timed-out store calls, by operation."
        );
        describe_counter!(
            metric::INVALIDATED_KEYS,
            Unit::Count,
            "Total number of keys removed through tag invalidation."
        );
        describe_counter!(
            metric::MEMORY_EVICT,
            Unit::Count,
            "Total number of memory-store evictions due to capacity."
        );
        describe_gauge!(
            metric::EVENT_QUEUE_LEN,
            Unit::Count,
            "Current number of pending cache events in the queue."
        );
        describe_histogram!(
            metric::CONSUME_MS,
            Unit::Milliseconds,
            "Invalidation batch latency in milliseconds."
        );
    });
}
