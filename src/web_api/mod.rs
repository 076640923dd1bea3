//! WebAPI - HTTP Endpoints
//!
//! ## Responsibilities
//!
//! - REST routes (health, metrics sink)
//! - WebSocket upgrade into the signaling relay
//! - Response formatting

mod routes;

pub use routes::create_router;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde_json::json;

use crate::models::HealthResponse;
use crate::state::AppState;

/// Service banner endpoint
pub async fn root() -> impl IntoResponse {
    Json(json!({
        "message": "WebRTC Object Detection System",
        "status": "running"
    }))
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model_loaded: state.engine.available(),
        connected_clients: state.rooms.connected_clients().await,
        timestamp: Utc::now(),
    };

    Json(response)
}
