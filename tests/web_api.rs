//! HTTP surface tests driven through the router with `tower::oneshot`.

use std::path::PathBuf;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use vision_relay::web_api;
use vision_relay::{AppConfig, AppState};

fn test_state() -> AppState {
    AppState::new(AppConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        model_path: PathBuf::from("does-not-exist.onnx"),
        models_dir: PathBuf::from("models"),
        conf_threshold: 0.25,
        inference_workers: 1,
        frame_queue_depth: 2,
        cors_origins: "*".to_string(),
        metrics_capacity: 100,
    })
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_model_state() {
    let app = web_api::create_router(test_state());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["model_loaded"], false);
    assert_eq!(json["connected_clients"], 0);
}

#[tokio::test]
async fn metrics_roundtrip_by_session() {
    let state = test_state();
    let app = web_api::create_router(state);

    let record = serde_json::json!({
        "session_id": "s1",
        "frame_count": 42,
        "processed_fps": 12.5,
        "median_e2e_latency": 110.0,
        "p95_e2e_latency": 240.0,
        "uplink_kbps": 900.0,
        "downlink_kbps": 35.0
    });

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/metrics")
                .header("content-type", "application/json")
                .body(Body::from(record.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let stored = body_json(response).await;
    // Id and timestamp are generated when the caller omits them.
    assert!(stored["id"].is_string());
    assert_eq!(stored["frame_count"], 42);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/metrics/s1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let records = body_json(response).await;
    assert_eq!(records.as_array().unwrap().len(), 1);
    assert_eq!(records[0]["session_id"], "s1");
}

#[tokio::test]
async fn empty_session_id_is_rejected() {
    let app = web_api::create_router(test_state());

    let record = serde_json::json!({
        "session_id": "  ",
        "frame_count": 1,
        "processed_fps": 1.0,
        "median_e2e_latency": 1.0,
        "p95_e2e_latency": 1.0,
        "uplink_kbps": 1.0,
        "downlink_kbps": 1.0
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/metrics")
                .header("content-type", "application/json")
                .body(Body::from(record.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error_code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn unknown_session_yields_empty_list() {
    let app = web_api::create_router(test_state());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/metrics/nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 0);
}
