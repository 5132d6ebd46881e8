//! Process-wide logging and metric descriptions.

use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing::Subscriber;
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static DESCRIBE_ONCE: Once = Once::new();

const COUNTERS: &[(&str, &str)] = &[
    (
        "vellum_cache_hit_total",
        "Requests served straight from the page cache.",
    ),
    (
        "vellum_cache_miss_total",
        "Requests that found no usable page cache entry.",
    ),
    ("vellum_render_total", "Template renders, labelled by result."),
    ("vellum_not_found_total", "Requests whose path matched no route."),
    (
        "vellum_cache_pollution_total",
        "Cache entries found for paths that no route accepts.",
    ),
];

/// Install the global subscriber. `RUST_LOG` directives refine the
/// configured level.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(ErrorLayer::default())
        .with(output_layer(logging.format))
        .try_init()
        .map_err(|err| InfraError::telemetry(format!("subscriber already installed: {err}")))
}

fn output_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync + 'static>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    }
}

fn describe_metrics() {
    DESCRIBE_ONCE.call_once(|| {
        for &(name, help) in COUNTERS {
            describe_counter!(name, Unit::Count, help);
        }
        describe_histogram!(
            "vellum_reload_ms",
            Unit::Milliseconds,
            "Wall time of a full reload cycle."
        );
    });
}
