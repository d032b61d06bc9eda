//! HTTP surface tests driven through `tower::ServiceExt::oneshot`

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::{json, Value};
use std::io::{Cursor, Read};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use voicegate_config::{DeviceSettings, ServerSettings};
use voicegate_orchestrator::{MemoryReferenceStore, SpeechOrchestrator};
use voicegate_pipeline::framer::parse_job_marker;
use voicegate_pipeline::wav::decode_pcm16;
use voicegate_pipeline::{AudioJobCache, GatePool, StubModelLoader};
use voicegate_server::{create_router, AppState};

const RATE: u32 = 24_000;

fn test_app() -> Router {
    let gates = Arc::new(GatePool::from_settings(
        &DeviceSettings::default(),
        Arc::new(StubModelLoader::new(RATE)),
    ));
    let cache = Arc::new(AudioJobCache::new(Duration::from_secs(3_600), 16));
    let references = Arc::new(MemoryReferenceStore::new());
    let orchestrator = SpeechOrchestrator::new(gates, cache, references);
    let metrics = PrometheusBuilder::new().build_recorder().handle();
    create_router(AppState::new(orchestrator, metrics), &ServerSettings::default())
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn test_custom_generation_returns_wav_and_job_id() {
    let app = test_app();

    let response = app
        .clone()
        .oneshot(post_json("/api/tts/custom", json!({"text": "Hello", "speaker": "Ryan"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/wav");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "inline; filename=\"output.wav\""
    );
    let job_id = response.headers()["x-job-id"].to_str().unwrap().to_string();
    let wav = body_bytes(response).await;
    let (samples, rate) = decode_pcm16(&wav).unwrap();
    assert_eq!(rate, RATE);
    assert_eq!(samples.len(), 5 * (RATE as usize / 20));

    let download = app
        .oneshot(get(&format!("/api/tts/download/{}", job_id)))
        .await
        .unwrap();
    assert_eq!(download.status(), StatusCode::OK);
    assert_eq!(
        download.headers()[header::CONTENT_DISPOSITION],
        format!("attachment; filename=\"generated_{}.wav\"", &job_id[..8]).as_str()
    );
    assert_eq!(body_bytes(download).await, wav);
}

#[tokio::test]
async fn test_validation_error_names_the_field() {
    let response = test_app()
        .oneshot(post_json("/api/tts/custom", json!({"text": "Hello"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "invalid_request_error");
    assert_eq!(body["error"]["param"], "speaker");
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/tts/design")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = test_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["type"], "invalid_request_error");
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let response = test_app()
        .oneshot(get("/api/tts/download/6ba7b810-9dad-11d1-80b4-00c04fd430c8"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"]["type"], "not_found_error");
}

#[tokio::test]
async fn test_malformed_job_id_is_rejected() {
    let response = test_app()
        .oneshot(get("/api/tts/download/..%2F..%2Fetc%2Fpasswd"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_job() {
    let app = test_app();
    let response = app
        .clone()
        .oneshot(post_json("/api/tts/design", json!({"text": "Hi", "instruct": "warm"})))
        .await
        .unwrap();
    let job_id = response.headers()["x-job-id"].to_str().unwrap().to_string();

    let delete = Request::builder()
        .method("DELETE")
        .uri(format!("/api/tts/jobs/{}", job_id))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(delete).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(get(&format!("/api/tts/download/{}", job_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_clone_with_unknown_reference_is_not_found() {
    let response = test_app()
        .oneshot(post_json(
            "/api/tts/clone",
            json!({"text": "Hi", "ref_audio_ids": ["9b2d6f7e-1c3a-4e5b-8f9d-0a1b2c3d4e5f"]}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stream_ends_with_job_marker() {
    let app = test_app();
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/tts/custom/stream",
            json!({"text": "Streaming", "speaker": "Ryan"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_bytes(response).await;
    assert_eq!(&body[..4], b"RIFF");
    let job_id = parse_job_marker(&body).expect("completion marker");

    let download = app
        .oneshot(get(&format!("/api/tts/download/{}", job_id)))
        .await
        .unwrap();
    assert_eq!(download.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_batch_returns_zip_of_wavs() {
    let app = test_app();
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/tts/design/batch",
            json!({"texts": ["Hi", "Hello"], "instruct": "a calm narrator"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/zip");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"voicegate_batch.zip\""
    );

    let mut archive = zip::ZipArchive::new(Cursor::new(body_bytes(response).await)).unwrap();
    assert_eq!(archive.len(), 2);
    let mut wav = Vec::new();
    archive.by_name("output_002.wav").unwrap().read_to_end(&mut wav).unwrap();
    let (samples, rate) = decode_pcm16(&wav).unwrap();
    assert_eq!(rate, RATE);
    assert_eq!(samples.len(), 5 * (RATE as usize / 20));

    let response = app
        .oneshot(post_json(
            "/api/tts/design/batch",
            json!({"texts": ["Hi", 3], "instruct": "a calm narrator"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["param"], "texts[1]");
}

#[tokio::test]
async fn test_dialogue_has_no_batch_route() {
    let response = test_app()
        .oneshot(post_json("/api/tts/dialogue/batch", json!({"texts": ["[S1] Hi"]})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_dialogue_markup() {
    let markup = "<speak><voice name=\"Aiden\">Hi</voice><break time=\"100ms\"/>\
                  <voice name=\"Serena\">Bye</voice></speak>";
    let response = test_app()
        .oneshot(post_json("/api/tts/dialogue", json!({ "text": markup })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let (samples, _) = decode_pcm16(&body_bytes(response).await).unwrap();
    let speech = 5 * (RATE as usize / 20);
    let pause = RATE as usize / 10;
    assert_eq!(samples.len(), speech + pause);
}

#[tokio::test]
async fn test_dialogue_markup_speech_over_text_limit() {
    let markup = format!("<speak><voice name=\"Aiden\">{}</voice></speak>", "a".repeat(5_001));
    let response = test_app()
        .oneshot(post_json("/api/tts/dialogue", json!({ "text": markup })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["param"], "text");
}

#[tokio::test]
async fn test_dialogue_markup_error() {
    let response = test_app()
        .oneshot(post_json(
            "/api/tts/dialogue",
            json!({"text": "<speak><voice name=\"A\">Hi</speak>"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["type"], "markup_error");
}

#[tokio::test]
async fn test_catalogues() {
    let app = test_app();

    let speakers = body_json(app.clone().oneshot(get("/api/tts/speakers")).await.unwrap()).await;
    let names: Vec<&str> = speakers["speakers"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|s| s["name"].as_str())
        .collect();
    assert!(names.contains(&"Ryan"));

    let languages = body_json(app.oneshot(get("/api/tts/languages")).await.unwrap()).await;
    assert_eq!(languages["default"], "English");
    assert_eq!(languages["languages"].as_array().unwrap().len(), 11);
}

#[tokio::test]
async fn test_health_reports_loaded_variants() {
    let app = test_app();

    let health = body_json(app.clone().oneshot(get("/health")).await.unwrap()).await;
    assert_eq!(health["status"], "ok");
    assert_eq!(health["devices"][0]["device"], "cuda:0");
    assert!(health["devices"][0]["loaded"].as_array().unwrap().is_empty());

    app.clone()
        .oneshot(post_json("/api/tts/custom", json!({"text": "Hi", "speaker": "Ryan"})))
        .await
        .unwrap();

    let health = body_json(app.oneshot(get("/health")).await.unwrap()).await;
    assert_eq!(health["devices"][0]["loaded"], json!(["custom_voice"]));
    assert_eq!(health["cached_jobs"], 1);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let response = test_app().oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
}
