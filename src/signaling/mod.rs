//! SignalingRelay - Per-Connection Message Loop
//!
//! ## Responsibilities
//!
//! - One message loop per connected client, concurrent with all others
//! - Decode inbound control messages and dispatch by type
//! - Forward opaque negotiation payloads to other room members
//! - Hand frames to the pipeline and address results back to the sender
//!
//! Protocol errors (unparseable or unrecognized messages) are discarded
//! silently and the connection keeps processing subsequent messages; only
//! transport-level failures end the loop.

pub mod messages;

use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::FrameRequest;
use crate::room_registry::Role;
use crate::state::AppState;
use messages::{ClientMessage, ServerMessage};

/// Drive one client connection until transport-level disconnect.
pub async fn handle_connection(
    socket: WebSocket,
    state: AppState,
    client_id: String,
    room_id: String,
) {
    let (mut sender, mut receiver) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let registry_tx = tx.clone();
    let role = state.rooms.join(&client_id, &room_id, tx).await;
    tracing::info!(client_id = %client_id, room_id = %room_id, role = ?role, "WebSocket client connected");

    // Forward messages addressed to this client out over the socket. Ends
    // when the registry entry (and with it the channel sender) is dropped.
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    let recv_state = state.clone();
    let recv_client = client_id.clone();
    let recv_room = room_id.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Text(text)) => {
                    dispatch(&recv_state, &recv_client, &recv_room, &text).await;
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(client_id = %recv_client, error = %e, "WebSocket error");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    // Scoped to this connection's channel: if the id has already rejoined,
    // the replacement registration stays untouched.
    state.rooms.leave_connection(&client_id, &registry_tx).await;
    tracing::info!(client_id = %client_id, "WebSocket client disconnected");
}

/// Handle one inbound text message.
///
/// Malformed payloads are discarded without closing the connection.
pub async fn dispatch(state: &AppState, client_id: &str, room_id: &str, raw: &str) {
    let message = match serde_json::from_str::<ClientMessage>(raw) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(client_id = %client_id, error = %e, "Discarding malformed message");
            return;
        }
    };

    match message {
        ClientMessage::Offer(_) | ClientMessage::Answer(_) | ClientMessage::IceCandidate(_) => {
            // The negotiation payload is opaque; forward the original text so
            // it is never re-serialized or mutated beyond addressing.
            state.rooms.broadcast(room_id, Some(client_id), raw).await;
        }
        ClientMessage::Frame(frame) => {
            let request = FrameRequest {
                frame_id: frame
                    .frame_id
                    .unwrap_or_else(|| Uuid::new_v4().to_string()),
                capture_ts: frame
                    .capture_ts
                    .unwrap_or_else(|| Utc::now().timestamp_millis()),
                data: frame.data,
            };

            // Run the submission in its own task so a slow inference never
            // blocks this connection's loop for other message types.
            let state = state.clone();
            let client_id = client_id.to_string();
            tokio::spawn(async move {
                let result = match state.pipeline.submit(request).await {
                    Ok(reply) => {
                        send_message(&state, &client_id, &ServerMessage::Detection(reply)).await
                    }
                    Err(e) => {
                        tracing::warn!(client_id = %client_id, error = %e, "Frame submission rejected");
                        Ok(())
                    }
                };
                if let Err(e) = result {
                    tracing::error!(client_id = %client_id, error = %e, "Failed to send detection reply");
                }
            });
        }
        ClientMessage::JoinRoom(join) => {
            // Re-query the registry so a post-promotion role is reported
            // accurately.
            let reply = match state.rooms.role_of(client_id).await {
                Some((current_room, role)) => ServerMessage::RoomJoined {
                    room_id: current_room,
                    client_id: client_id.to_string(),
                    client_type: role,
                },
                None => ServerMessage::RoomJoined {
                    room_id: join.room_id.unwrap_or_else(|| room_id.to_string()),
                    client_id: client_id.to_string(),
                    client_type: Role::Unassigned,
                },
            };
            if let Err(e) = send_message(state, client_id, &reply).await {
                tracing::error!(client_id = %client_id, error = %e, "Failed to send join confirmation");
            }
        }
        ClientMessage::Ping => {
            let pong = ServerMessage::Pong {
                timestamp: Utc::now().timestamp_millis(),
            };
            if let Err(e) = send_message(state, client_id, &pong).await {
                tracing::error!(client_id = %client_id, error = %e, "Failed to send pong");
            }
        }
        ClientMessage::Unknown => {
            tracing::trace!(client_id = %client_id, "Ignoring unrecognized message type");
        }
    }
}

async fn send_message(state: &AppState, client_id: &str, message: &ServerMessage) -> crate::Result<()> {
    let json = serde_json::to_string(message)?;
    state.rooms.send_to(client_id, json).await;
    Ok(())
}
