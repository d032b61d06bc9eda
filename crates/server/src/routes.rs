//! HTTP routes
//!
//! A thin adapter: every handler forwards the raw JSON body to the
//! orchestrator and shapes its result into a response.

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderName, Response, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use futures::StreamExt;
use serde::Serialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use voicegate_config::ServerSettings;
use voicegate_core::{AudioJob, Language, Mode, ModelVariant, SpeakerInfo, PRESET_SPEAKERS};
use voicegate_orchestrator::SpeechOrchestrator;

use crate::error::ApiError;
use crate::state::AppState;

const MODES: [Mode; 4] = [Mode::Clone, Mode::CustomPreset, Mode::Design, Mode::Dialogue];

const JOB_ID_HEADER: HeaderName = HeaderName::from_static("x-job-id");

const BATCH_MODES: [Mode; 3] = [Mode::Clone, Mode::CustomPreset, Mode::Design];

type JsonBody = Result<Json<Value>, JsonRejection>;

/// Create the main router
pub fn create_router(state: AppState, server: &ServerSettings) -> Router {
    Router::new()
        .nest("/api/tts", tts_routes())
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(TimeoutLayer::new(server.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers([header::CONTENT_DISPOSITION, JOB_ID_HEADER]),
        )
        .with_state(state)
}

fn tts_routes() -> Router<AppState> {
    let mut router = Router::new();
    for mode in MODES {
        router = router
            .route(
                &format!("/{}", mode.as_str()),
                post(move |State(state): State<AppState>, body: JsonBody| async move {
                    generate(state, mode, body).await
                }),
            )
            .route(
                &format!("/{}/stream", mode.as_str()),
                post(move |State(state): State<AppState>, body: JsonBody| async move {
                    generate_stream(state, mode, body).await
                }),
            );
    }
    for mode in BATCH_MODES {
        router = router.route(
            &format!("/{}/batch", mode.as_str()),
            post(move |State(state): State<AppState>, body: JsonBody| async move {
                generate_batch(state, mode, body).await
            }),
        );
    }
    router
        .route("/download/:job_id", get(download))
        .route("/jobs/:job_id", delete(delete_job))
        .route("/speakers", get(speakers))
        .route("/languages", get(languages))
}

async fn wav_bytes(job: Arc<AudioJob>) -> Result<Vec<u8>, ApiError> {
    tokio::task::spawn_blocking(move || SpeechOrchestrator::encode_job(&job))
        .await
        .map_err(|e| ApiError::internal(format!("Audio encoding failed: {}", e)))?
        .map_err(ApiError::from)
}

/// Generate a complete WAV file
async fn generate(state: AppState, mode: Mode, body: JsonBody) -> Result<Response<Body>, ApiError> {
    let Json(body) = body?;
    info!(%mode, "Generation request");

    let job = state.orchestrator.generate(mode, &body).await?;
    let job_id = job.id().to_string();
    let wav = wav_bytes(job).await?;

    Response::builder()
        .header(header::CONTENT_TYPE, "audio/wav")
        .header(header::CONTENT_DISPOSITION, "inline; filename=\"output.wav\"")
        .header(JOB_ID_HEADER, job_id)
        .body(Body::from(wav))
        .map_err(|e| ApiError::internal(e.to_string()))
}

/// Stream a WAV of unknown length followed by the completion marker
async fn generate_stream(
    state: AppState,
    mode: Mode,
    body: JsonBody,
) -> Result<Response<Body>, ApiError> {
    let Json(body) = body?;
    info!(%mode, "Streaming generation request");

    let stream = state.orchestrator.generate_stream(mode, &body).await?;
    let body = Body::from_stream(stream.into_stream().map(Ok::<_, Infallible>));

    Response::builder()
        .header(header::CONTENT_TYPE, "audio/wav")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(body)
        .map_err(|e| ApiError::internal(e.to_string()))
}

/// Generate every text of a batch and return them as a zip of WAV files
async fn generate_batch(state: AppState, mode: Mode, body: JsonBody) -> Result<Response<Body>, ApiError> {
    let Json(body) = body?;
    info!(%mode, "Batch generation request");

    let waveforms = state.orchestrator.generate_batch(mode, &body).await?;
    let archive = tokio::task::spawn_blocking(move || SpeechOrchestrator::encode_batch(&waveforms))
        .await
        .map_err(|e| ApiError::internal(format!("Archive encoding failed: {}", e)))??;

    Response::builder()
        .header(header::CONTENT_TYPE, "application/zip")
        .header(
            header::CONTENT_DISPOSITION,
            "attachment; filename=\"voicegate_batch.zip\"",
        )
        .body(Body::from(archive))
        .map_err(|e| ApiError::internal(e.to_string()))
}

async fn download(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Response<Body>, ApiError> {
    let job = state.orchestrator.fetch_job(&job_id)?;
    let id = job.id().to_string();
    let wav = wav_bytes(job).await?;

    Response::builder()
        .header(header::CONTENT_TYPE, "audio/wav")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"generated_{}.wav\"", &id[..8]),
        )
        .body(Body::from(wav))
        .map_err(|e| ApiError::internal(e.to_string()))
}

async fn delete_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.orchestrator.delete_job(&job_id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
struct SpeakersResponse {
    speakers: &'static [SpeakerInfo],
}

async fn speakers() -> Json<SpeakersResponse> {
    Json(SpeakersResponse {
        speakers: &PRESET_SPEAKERS,
    })
}

async fn languages() -> Json<Value> {
    let names: Vec<&str> = Language::ALL.iter().map(Language::name).collect();
    Json(json!({
        "languages": names,
        "default": Language::default().name(),
    }))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let devices: Vec<Value> = state
        .orchestrator
        .gates()
        .gates()
        .iter()
        .map(|gate| {
            let loaded: Vec<&str> = ModelVariant::ALL
                .iter()
                .filter(|v| gate.is_loaded(**v))
                .map(ModelVariant::as_str)
                .collect();
            json!({ "device": gate.device().as_str(), "loaded": loaded })
        })
        .collect();

    Json(json!({
        "status": "ok",
        "devices": devices,
        "cached_jobs": state.orchestrator.cache().len(),
    }))
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
