//! API Routes

use axum::{
    extract::{ws::WebSocketUpgrade, Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::SessionMetrics;
use crate::signaling;
use crate::state::AppState;

/// Create API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health & Status
        .route("/api/", get(super::root))
        .route("/api/health", get(super::health_check))
        // Metrics sink
        .route("/api/metrics", post(store_metrics))
        .route("/api/metrics/:session_id", get(get_metrics))
        // WebSocket signaling
        .route("/ws/:client_id", get(websocket_handler))
        .with_state(state)
}

// ========================================
// Metrics Handlers
// ========================================

async fn store_metrics(
    State(state): State<AppState>,
    Json(metrics): Json<SessionMetrics>,
) -> Result<Json<SessionMetrics>> {
    if metrics.session_id.trim().is_empty() {
        return Err(Error::Validation("session_id must not be empty".to_string()));
    }
    Ok(Json(state.metrics.record(metrics).await))
}

async fn get_metrics(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    Json(state.metrics.for_session(&session_id, 100).await)
}

// ========================================
// WebSocket Handler
// ========================================

#[derive(Debug, Deserialize)]
struct WsQuery {
    #[serde(default)]
    room_id: Option<String>,
}

/// WebSocket upgrade handler
async fn websocket_handler(
    ws: WebSocketUpgrade,
    Path(client_id): Path<String>,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let room_id = query.room_id.unwrap_or_else(|| "default".to_string());
    ws.on_upgrade(move |socket| signaling::handle_connection(socket, state, client_id, room_id))
}
