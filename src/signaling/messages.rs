//! Signaling protocol messages
//!
//! Inbound and outbound messages are closed tagged unions keyed by `type`.
//! Unknown inbound types map to [`ClientMessage::Unknown`] so the relay can
//! ignore them without treating them as errors.

use serde::{Deserialize, Serialize};

use crate::models::DetectionReply;
use crate::room_registry::Role;

/// Opaque negotiation payload carried by relayed signaling messages.
///
/// The relay never inspects these fields; they are validated only as far as
/// "is a JSON object" and forwarded verbatim from the original text.
#[derive(Debug, Clone, Deserialize)]
pub struct SignalPayload {
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// Frame submission
#[derive(Debug, Clone, Deserialize)]
pub struct FrameMessage {
    /// Base64 (optionally data-URI wrapped) image payload
    pub data: String,
    #[serde(default)]
    pub frame_id: Option<String>,
    /// Client-clock capture timestamp (ms)
    #[serde(default)]
    pub capture_ts: Option<i64>,
}

/// Room membership query
#[derive(Debug, Clone, Deserialize)]
pub struct JoinRoomMessage {
    #[serde(default)]
    pub room_id: Option<String>,
}

/// Messages accepted from clients
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "offer")]
    Offer(SignalPayload),
    #[serde(rename = "answer")]
    Answer(SignalPayload),
    #[serde(rename = "ice-candidate")]
    IceCandidate(SignalPayload),
    #[serde(rename = "frame")]
    Frame(FrameMessage),
    #[serde(rename = "join_room")]
    JoinRoom(JoinRoomMessage),
    #[serde(rename = "ping")]
    Ping,
    /// Unrecognized type: ignored, no reply, no error
    #[serde(other)]
    Unknown,
}

/// Messages sent to clients
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "detection")]
    Detection(DetectionReply),
    #[serde(rename = "room_joined")]
    RoomJoined {
        room_id: String,
        client_id: String,
        client_type: Role,
    },
    #[serde(rename = "pong")]
    Pong { timestamp: i64 },
}
