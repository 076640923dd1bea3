//! Shared models and types for the vision relay
//!
//! This module contains types shared across multiple modules
//! to avoid circular dependencies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One labeled, scored bounding box produced by the detection engine.
///
/// Coordinates are corners normalized to [0, 1] of the original image
/// dimensions, not the model's padded input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Detection {
    pub label: String,
    pub score: f32,
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
}

/// Frame submitted for detection by a connected client
#[derive(Debug, Clone)]
pub struct FrameRequest {
    pub frame_id: String,
    /// Client-clock capture timestamp (ms)
    pub capture_ts: i64,
    /// Base64 (optionally data-URI wrapped) image payload
    pub data: String,
}

/// Completed detection result addressed back to the submitting client.
///
/// The three timestamps let a client compute capture-to-receipt and
/// receipt-to-result latencies independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionReply {
    pub frame_id: String,
    pub capture_ts: i64,
    /// Stamped when the frame pipeline accepted the request (ms)
    pub recv_ts: i64,
    /// Stamped immediately before the engine call began (ms)
    pub inference_ts: i64,
    pub detections: Vec<Detection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Session summary record accepted by the metrics store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetrics {
    #[serde(default = "new_metrics_id")]
    pub id: Uuid,
    pub session_id: String,
    pub frame_count: u64,
    pub processed_fps: f64,
    pub median_e2e_latency: f64,
    pub p95_e2e_latency: f64,
    pub uplink_kbps: f64,
    pub downlink_kbps: f64,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

fn new_metrics_id() -> Uuid {
    Uuid::new_v4()
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub model_loaded: bool,
    pub connected_clients: usize,
    pub timestamp: DateTime<Utc>,
}
