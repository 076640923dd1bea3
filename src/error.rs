//! Error handling for the vision relay

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Image payload could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Model inference failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Frame pipeline has shut down and accepts no new work
    #[error("Frame pipeline closed")]
    PipelineClosed,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            Error::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            Error::Decode(msg) => (StatusCode::BAD_REQUEST, "DECODE_ERROR", msg.clone()),
            Error::Inference(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INFERENCE_ERROR",
                msg.clone(),
            ),
            Error::PipelineClosed => (
                StatusCode::SERVICE_UNAVAILABLE,
                "PIPELINE_CLOSED",
                "frame pipeline is shut down".to_string(),
            ),
            Error::Serialization(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "SERIALIZATION_ERROR",
                e.to_string(),
            ),
        };

        tracing::error!(
            status = %status,
            error_code = %error_code,
            message = %message,
            "Request error"
        );

        let body = Json(json!({
            "error_code": error_code,
            "message": message
        }));

        (status, body).into_response()
    }
}
