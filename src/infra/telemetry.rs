use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

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
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
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

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "tutorium_cache_hit_total",
            Unit::Count,
            "Total number of remote cache hits."
        );
        describe_counter!(
            "tutorium_cache_miss_total",
            Unit::Count,
            "Total number of remote cache misses, including undecodable entries."
        );
        describe_counter!(
            "tutorium_cache_negative_hit_total",
            Unit::Count,
            "Total number of lookups answered by a cached absence marker."
        );
        describe_counter!(
            "tutorium_cache_fallback_total",
            Unit::Count,
            "Cache operations answered with their fallback value, by operation and reason."
        );
        describe_counter!(
            "tutorium_cache_reconnect_total",
            Unit::Count,
            "Reconnect attempts against the remote cache, by outcome."
        );
        describe_gauge!(
            "tutorium_cache_connected",
            Unit::Count,
            "1 while the remote cache connection is ready, 0 otherwise."
        );
        describe_counter!(
            "tutorium_listing_cache_evict_total",
            Unit::Count,
            "Total number of listing cache entries evicted due to capacity."
        );
        describe_counter!(
            "tutorium_listing_stale_served_total",
            Unit::Count,
            "Listing responses served from a stale entry after a failed recompute."
        );
        describe_counter!(
            "tutorium_background_task_failures_total",
            Unit::Count,
            "Background tasks that finished with an error, by task name."
        );
        describe_counter!(
            "tutorium_lock_poison_recovered_total",
            Unit::Count,
            "Poisoned in-process locks recovered, by lock kind."
        );
        describe_histogram!(
            "tutorium_read_path_ms",
            Unit::Milliseconds,
            "Single post read latency in milliseconds, by outcome."
        );
    });
}
