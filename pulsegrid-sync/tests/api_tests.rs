//! HTTP API integration tests
//!
//! Exercises the axum router in-process (no socket) against an engine with
//! no database attached; persistence is best-effort and must never be
//! required for the endpoints to answer.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use pulsegrid_sync::api::server::{create_router, AppContext};
use pulsegrid_sync::engine::{BootstrapPredictor, PredictionMode, SlotPriorModel};
use pulsegrid_sync::PredictionEngine;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn test_context(mode: PredictionMode) -> AppContext {
    AppContext {
        engine: Arc::new(PredictionEngine::new(120.0, 30.0, mode)),
        db_pool: None,
    }
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_router(test_context(PredictionMode::Realtime));

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["module"], "synchronizer");
}

#[tokio::test]
async fn test_ping_returns_server_time() {
    let app = create_router(test_context(PredictionMode::Realtime));

    let response = app
        .oneshot(post_json(
            "/ping",
            json!({"device_id": "dev-1", "t0_device_ms": 0.0}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "success");
    assert!(body["server_time_ms"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn test_ping_full_triple_registers_device() {
    let ctx = test_context(PredictionMode::Realtime);
    let app = create_router(ctx.clone());

    // Complete one calibration round trip
    let response = app
        .clone()
        .oneshot(post_json(
            "/ping",
            json!({
                "device_id": "dev-1",
                "t0_device_ms": 0.0,
                "t1_server_ms": 50.0,
                "t2_device_ms": 20.0
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/status")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["engine_state"]["num_devices"], 1);
}

#[tokio::test]
async fn test_pulse_submission_without_database() {
    let app = create_router(test_context(PredictionMode::Realtime));

    let response = app
        .oneshot(post_json(
            "/pulse",
            json!({"device_id": "dev-1", "t_device_ms": 1000.0, "dur_ms": 80.0}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "success");
    // First pulse opens a cluster; no canonical event yet
    assert!(body.get("canonical_event").is_none());
}

#[tokio::test]
async fn test_predict_phrase_bootstrap_ingests_and_answers() {
    let ctx = test_context(PredictionMode::Bootstrap);
    ctx.engine
        .set_bootstrap_predictor(BootstrapPredictor::new(SlotPriorModel::default()));
    let app = create_router(ctx);

    let mut pattern = vec![0; 32];
    pattern[0] = 1;
    let response = app
        .oneshot(post_json(
            "/predict_phrase",
            json!({
                "recentPulsePatterns": [pattern],
                "currentBPM": 100.0,
                "device_id": "dev-1"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["bpm"], 100.0);
    assert_eq!(body["slots_per_beat"], 32);
    assert_eq!(body["phrase_beats"], 4);

    let onset = body["onset"].as_array().unwrap();
    assert_eq!(onset.len(), 128);
    assert_eq!(onset[0], 1.0);
    assert_eq!(onset[32], 1.0);
    assert_eq!(onset[1], 0.0);
}

#[tokio::test]
async fn test_predict_phrase_realtime_without_data_is_structured_error() {
    let app = create_router(test_context(PredictionMode::Realtime));

    let response = app
        .oneshot(post_json("/predict_phrase", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "Not enough data for prediction");
}

#[tokio::test]
async fn test_predict_phrase_realtime_ingests_timestamps() {
    let app = create_router(test_context(PredictionMode::Realtime));

    // A steady pulse train in one batched request locks the tempo
    let timestamps: Vec<f64> = (0..12).map(|i| i as f64 * 500.0).collect();
    let response = app
        .oneshot(post_json(
            "/predict_phrase",
            json!({
                "recentPulseTimestamps": timestamps,
                "device_id": "dev-1"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "success");
    let bpm = body["bpm"].as_f64().unwrap();
    assert!((60.0..=200.0).contains(&bpm));
    assert_eq!(body["onset"].as_array().unwrap().len(), 128);
}

#[tokio::test]
async fn test_status_reports_mode_and_readiness() {
    let ctx = test_context(PredictionMode::Bootstrap);
    let app = create_router(ctx.clone());

    let body = body_json(app.clone().oneshot(get("/status")).await.unwrap()).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["mode"], "bootstrap");
    assert_eq!(body["bootstrap_ready"], false);
    assert_eq!(body["engine_state"]["bpm"], 120.0);

    let mut model = SlotPriorModel::default();
    model.update_from_patterns(&[vec![1; 32]], None);
    ctx.engine
        .set_bootstrap_predictor(BootstrapPredictor::new(model));

    let body = body_json(app.oneshot(get("/status")).await.unwrap()).await;
    assert_eq!(body["bootstrap_ready"], true);
}

#[tokio::test]
async fn test_traces_endpoint_honors_limit() {
    let ctx = test_context(PredictionMode::Realtime);
    ctx.engine.enable_tracing(true);
    let app = create_router(ctx.clone());

    for i in 0..20 {
        let t = i as f64 * 500.0;
        app.clone()
            .oneshot(post_json(
                "/pulse",
                json!({"device_id": "dev-1", "t_device_ms": t}),
            ))
            .await
            .unwrap();
    }

    let body = body_json(app.clone().oneshot(get("/traces?limit=5")).await.unwrap()).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["traces"].as_array().unwrap().len(), 5);

    // Default limit is 10
    let body = body_json(app.oneshot(get("/traces")).await.unwrap()).await;
    assert_eq!(body["traces"].as_array().unwrap().len(), 10);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = create_router(test_context(PredictionMode::Realtime));
    let response = app.oneshot(get("/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
