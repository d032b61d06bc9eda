//! Shared application state

use metrics_exporter_prometheus::PrometheusHandle;
use voicegate_orchestrator::SpeechOrchestrator;

/// Cheap to clone; every field is reference counted
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: SpeechOrchestrator,
    /// Renders the Prometheus exposition for `/metrics`
    pub metrics: PrometheusHandle,
}

impl AppState {
    pub fn new(orchestrator: SpeechOrchestrator, metrics: PrometheusHandle) -> Self {
        Self {
            orchestrator,
            metrics,
        }
    }
}
