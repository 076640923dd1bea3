//! Vision Relay
//!
//! WebRTC signaling relay with an optional server-side object detection path.
//!
//! ## Architecture (7 Components)
//!
//! 1. RoomRegistry - room membership, roles, host election
//! 2. SignalingRelay - per-connection message loop and dispatch
//! 3. FramePipeline - bounded worker pool for inference offload
//! 4. FrameCodec - image decode and letterbox geometry
//! 5. DetectionEngine - ONNX object detector wrapper
//! 6. MetricsStore - session summary sink (ring buffer)
//! 7. WebAPI - HTTP endpoints and WebSocket upgrade
//!
//! ## Design Principles
//!
//! - The registry is the single owner of room state; callers never touch
//!   room internals directly
//! - Protocol messages are closed tagged unions validated at the boundary
//! - A slow or failing frame never stalls the signaling control plane

pub mod detection_engine;
pub mod error;
pub mod frame_codec;
pub mod frame_pipeline;
pub mod metrics_store;
pub mod models;
pub mod room_registry;
pub mod signaling;
pub mod state;
pub mod web_api;

pub use error::{Error, Result};
pub use state::{AppConfig, AppState};
