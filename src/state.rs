//! Application state
//!
//! Holds all shared components and state

use std::path::PathBuf;
use std::sync::Arc;

use crate::detection_engine::{DetectionEngine, DEFAULT_CONF_THRESHOLD, MODEL_INPUT_SIZE};
use crate::frame_pipeline::{FramePipeline, DEFAULT_QUEUE_DEPTH, DEFAULT_WORKERS};
use crate::metrics_store::MetricsStore;
use crate::room_registry::RoomRegistry;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// ONNX model file path
    pub model_path: PathBuf,
    /// Directory served at /models
    pub models_dir: PathBuf,
    /// Confidence threshold for both objectness and class score
    pub conf_threshold: f32,
    /// Concurrent inference executions
    pub inference_workers: usize,
    /// Queued frames before submitters wait
    pub frame_queue_depth: usize,
    /// Comma-separated allowed CORS origins, `*` for any
    pub cors_origins: String,
    /// Retained session metrics records
    pub metrics_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            model_path: std::env::var("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("models/yolov5n.onnx")),
            models_dir: std::env::var("MODELS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("models")),
            conf_threshold: std::env::var("CONF_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_CONF_THRESHOLD),
            inference_workers: std::env::var("INFERENCE_WORKERS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_WORKERS),
            frame_queue_depth: std::env::var("FRAME_QUEUE_DEPTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_QUEUE_DEPTH),
            cors_origins: std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string()),
            metrics_capacity: std::env::var("METRICS_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1000),
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application config
    pub config: AppConfig,
    /// RoomRegistry (room/role ownership)
    pub rooms: Arc<RoomRegistry>,
    /// DetectionEngine (model wrapper)
    pub engine: Arc<DetectionEngine>,
    /// FramePipeline (bounded inference offload)
    pub pipeline: Arc<FramePipeline>,
    /// MetricsStore (session summaries)
    pub metrics: Arc<MetricsStore>,
}

impl AppState {
    /// Build all components from config. Must be called from within a tokio
    /// runtime (the frame pipeline spawns its worker tasks here).
    pub fn new(config: AppConfig) -> Self {
        let engine = Arc::new(DetectionEngine::load(
            &config.model_path,
            MODEL_INPUT_SIZE,
            MODEL_INPUT_SIZE,
            config.conf_threshold,
        ));
        let pipeline = Arc::new(FramePipeline::new(
            engine.clone(),
            config.inference_workers,
            config.frame_queue_depth,
        ));

        Self {
            rooms: Arc::new(RoomRegistry::new()),
            metrics: Arc::new(MetricsStore::new(config.metrics_capacity)),
            engine,
            pipeline,
            config,
        }
    }
}
