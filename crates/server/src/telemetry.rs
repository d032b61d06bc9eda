//! Logging and metrics bootstrap

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "info,voicegate=debug,tower_http=debug";

/// Install the global tracing subscriber; `RUST_LOG` overrides the default filter
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Install the global Prometheus recorder
pub fn install_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe_metrics();
    Ok(handle)
}

fn describe_metrics() {
    metrics::describe_counter!(
        "voicegate_generations_total",
        "Generation requests by mode and outcome"
    );
    metrics::describe_histogram!(
        "voicegate_generation_seconds",
        metrics::Unit::Seconds,
        "End-to-end generation latency"
    );
    metrics::describe_histogram!(
        "voicegate_gate_wait_seconds",
        metrics::Unit::Seconds,
        "Time spent waiting for a device gate"
    );
    metrics::describe_gauge!("voicegate_cache_entries", "Audio jobs currently cached");
    metrics::describe_counter!(
        "voicegate_cache_evictions_total",
        "Cached audio jobs dropped, by reason"
    );
}
