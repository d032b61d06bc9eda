//! voicegate server binary

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info};
use voicegate_config::{constants::audio, Settings};
use voicegate_orchestrator::SpeechOrchestrator;
use voicegate_pipeline::StubModelLoader;
use voicegate_server::{create_router, telemetry, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load settings")?;
    telemetry::init_tracing(settings.server.json_logs);
    let metrics = telemetry::install_metrics().context("failed to install metrics recorder")?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting voicegate");

    let loader = Arc::new(StubModelLoader::new(audio::MODEL_SAMPLE_RATE));
    let orchestrator = SpeechOrchestrator::from_settings(&settings, loader);

    if settings.devices.preload {
        let gates = orchestrator.gates().clone();
        tokio::task::spawn_blocking(move || gates.preload_all())
            .await
            .context("preload task panicked")?
            .context("failed to preload models")?;
        info!("All model variants preloaded");
    }

    let app = create_router(AppState::new(orchestrator, metrics), &settings.server);

    let addr = settings.server.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
