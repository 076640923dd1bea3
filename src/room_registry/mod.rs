//! RoomRegistry - Room/Role Ownership
//!
//! ## Responsibilities
//!
//! - Track room membership, per-client role and outbound channel
//! - Host election (first joiner becomes host) and host promotion on leave
//! - Broadcast addressing for the signaling relay
//!
//! All operations go through a single registry lock so no caller can observe
//! a room in a partially-updated state (host promotion is atomic with the
//! member removal that triggers it). Rooms are created lazily on first join
//! and are never destroyed; an empty room keeps existing with no host.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::{mpsc, RwLock};

/// Outbound channel to a connected client
pub type ClientSender = mpsc::UnboundedSender<String>;

/// Signaling-layer role of a room member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Phone,
    Unassigned,
}

/// Connected client owned by its room entry
struct Member {
    client_id: String,
    tx: ClientSender,
    role: Role,
    connected_at: DateTime<Utc>,
}

/// Room state: members in join order plus the current host
#[derive(Default)]
struct Room {
    members: Vec<Member>,
    host: Option<String>,
}

#[derive(Default)]
struct RegistryInner {
    rooms: HashMap<String, Room>,
    /// client_id -> room_id reverse index
    client_rooms: HashMap<String, String>,
}

/// RoomRegistry instance
pub struct RoomRegistry {
    inner: RwLock<RegistryInner>,
}

impl RoomRegistry {
    /// Create new empty registry
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
        }
    }

    /// Register a client in a room, electing it host if the room has none.
    ///
    /// A client identifier maps to at most one live connection; joining again
    /// with the same id replaces the previous registration.
    pub async fn join(&self, client_id: &str, room_id: &str, tx: ClientSender) -> Role {
        let mut inner = self.inner.write().await;

        if inner.client_rooms.contains_key(client_id) {
            Self::remove_locked(&mut inner, client_id, None);
        }

        let room = inner.rooms.entry(room_id.to_string()).or_default();
        let role = if room.host.is_none() {
            room.host = Some(client_id.to_string());
            Role::Host
        } else {
            Role::Phone
        };

        room.members.push(Member {
            client_id: client_id.to_string(),
            tx,
            role,
            connected_at: Utc::now(),
        });
        inner
            .client_rooms
            .insert(client_id.to_string(), room_id.to_string());

        tracing::info!(client_id = %client_id, room_id = %room_id, role = ?role, "Client joined room");

        role
    }

    /// Remove a client from whichever room holds it.
    ///
    /// If the removed client was the host, the earliest-joined remaining
    /// member is promoted. Safe no-op for unknown identifiers (disconnects
    /// can race with in-flight sends).
    pub async fn leave(&self, client_id: &str) {
        let mut inner = self.inner.write().await;
        Self::remove_locked(&mut inner, client_id, None);
    }

    /// Remove a client only if `tx` is still its registered channel.
    ///
    /// Disconnect cleanup races with rejoins under the same id: once a
    /// replacement has registered, the old connection's cleanup must not
    /// deregister it. Channel identity decides which connection the entry
    /// belongs to.
    pub async fn leave_connection(&self, client_id: &str, tx: &ClientSender) {
        let mut inner = self.inner.write().await;
        Self::remove_locked(&mut inner, client_id, Some(tx));
    }

    fn remove_locked(inner: &mut RegistryInner, client_id: &str, expected: Option<&ClientSender>) {
        let Some(room_id) = inner.client_rooms.get(client_id).cloned() else {
            return;
        };
        let Some(room) = inner.rooms.get_mut(&room_id) else {
            inner.client_rooms.remove(client_id);
            return;
        };

        if let Some(member) = room.members.iter().find(|m| m.client_id == client_id) {
            if let Some(expected) = expected {
                if !member.tx.same_channel(expected) {
                    // A replacement connection owns this id now.
                    return;
                }
            }
            let session_secs = (Utc::now() - member.connected_at).num_seconds();
            tracing::info!(client_id = %client_id, room_id = %room_id, session_secs, "Client left room");
        }
        inner.client_rooms.remove(client_id);
        room.members.retain(|m| m.client_id != client_id);

        if room.host.as_deref() == Some(client_id) {
            room.host = None;
            // Members are kept in join order, so the front is the
            // earliest-joined remaining member.
            if let Some(next) = room.members.first_mut() {
                next.role = Role::Host;
                room.host = Some(next.client_id.clone());
                tracing::info!(client_id = %next.client_id, room_id = %room_id, "Promoted to host");
            }
        }
    }

    /// Member ids of a room in join order (empty for unknown rooms)
    pub async fn members(&self, room_id: &str) -> Vec<String> {
        let inner = self.inner.read().await;
        inner
            .rooms
            .get(room_id)
            .map(|r| r.members.iter().map(|m| m.client_id.clone()).collect())
            .unwrap_or_default()
    }

    /// Outbound channel for a client, `None` if it is not connected
    pub async fn route(&self, client_id: &str) -> Option<ClientSender> {
        let inner = self.inner.read().await;
        let room_id = inner.client_rooms.get(client_id)?;
        let room = inner.rooms.get(room_id)?;
        room.members
            .iter()
            .find(|m| m.client_id == client_id)
            .map(|m| m.tx.clone())
    }

    /// Current room and role of a client
    pub async fn role_of(&self, client_id: &str) -> Option<(String, Role)> {
        let inner = self.inner.read().await;
        let room_id = inner.client_rooms.get(client_id)?;
        let room = inner.rooms.get(room_id)?;
        room.members
            .iter()
            .find(|m| m.client_id == client_id)
            .map(|m| (room_id.clone(), m.role))
    }

    /// Send a message to a single client.
    ///
    /// A failed channel send means the client is unreachable; it is
    /// deregistered exactly as if it had disconnected.
    pub async fn send_to(&self, client_id: &str, text: String) {
        let Some(tx) = self.route(client_id).await else {
            return;
        };
        if tx.send(text).is_err() {
            tracing::warn!(client_id = %client_id, "Send failed, deregistering client");
            self.leave_connection(client_id, &tx).await;
        }
    }

    /// Send a message to every room member except `exclude`
    pub async fn broadcast(&self, room_id: &str, exclude: Option<&str>, text: &str) {
        let targets: Vec<(String, ClientSender)> = {
            let inner = self.inner.read().await;
            match inner.rooms.get(room_id) {
                Some(room) => room
                    .members
                    .iter()
                    .filter(|m| Some(m.client_id.as_str()) != exclude)
                    .map(|m| (m.client_id.clone(), m.tx.clone()))
                    .collect(),
                None => return,
            }
        };

        let mut failed = Vec::new();
        for (client_id, tx) in targets {
            if tx.send(text.to_string()).is_err() {
                failed.push((client_id, tx));
            }
        }
        for (client_id, tx) in failed {
            tracing::warn!(client_id = %client_id, "Broadcast send failed, deregistering client");
            self.leave_connection(&client_id, &tx).await;
        }
    }

    /// Total connected clients across all rooms
    pub async fn connected_clients(&self) -> usize {
        let inner = self.inner.read().await;
        inner.client_rooms.len()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> (ClientSender, mpsc::UnboundedReceiver<String>) {
        mpsc::unbounded_channel()
    }

    #[tokio::test]
    async fn first_joiner_becomes_host_rest_are_phones() {
        let registry = RoomRegistry::new();
        let (tx_a, _rx_a) = channel();
        let (tx_b, _rx_b) = channel();
        let (tx_c, _rx_c) = channel();

        assert_eq!(registry.join("a", "r1", tx_a).await, Role::Host);
        assert_eq!(registry.join("b", "r1", tx_b).await, Role::Phone);
        assert_eq!(registry.join("c", "r1", tx_c).await, Role::Phone);
        assert_eq!(registry.members("r1").await, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn host_leave_promotes_earliest_joined_member() {
        let registry = RoomRegistry::new();
        let (tx_a, _rx_a) = channel();
        let (tx_b, _rx_b) = channel();
        let (tx_c, _rx_c) = channel();

        registry.join("a", "r1", tx_a).await;
        registry.join("b", "r1", tx_b).await;
        registry.join("c", "r1", tx_c).await;

        registry.leave("a").await;

        assert_eq!(registry.role_of("b").await, Some(("r1".to_string(), Role::Host)));
        assert_eq!(registry.role_of("c").await, Some(("r1".to_string(), Role::Phone)));
    }

    #[tokio::test]
    async fn non_host_leave_keeps_host() {
        let registry = RoomRegistry::new();
        let (tx_a, _rx_a) = channel();
        let (tx_b, _rx_b) = channel();
        let (tx_c, _rx_c) = channel();

        registry.join("a", "r1", tx_a).await;
        registry.join("b", "r1", tx_b).await;
        registry.join("c", "r1", tx_c).await;

        registry.leave("b").await;

        assert_eq!(registry.role_of("a").await, Some(("r1".to_string(), Role::Host)));
        assert_eq!(registry.members("r1").await, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn empty_room_stays_addressable_and_reelects_host() {
        let registry = RoomRegistry::new();
        let (tx_a, _rx_a) = channel();

        registry.join("a", "r1", tx_a).await;
        registry.leave("a").await;

        assert!(registry.members("r1").await.is_empty());

        // Next joiner becomes host again.
        let (tx_b, _rx_b) = channel();
        assert_eq!(registry.join("b", "r1", tx_b).await, Role::Host);
    }

    #[tokio::test]
    async fn leave_and_route_on_unknown_client_are_safe() {
        let registry = RoomRegistry::new();
        registry.leave("ghost").await;
        assert!(registry.route("ghost").await.is_none());
        assert!(registry.role_of("ghost").await.is_none());
    }

    #[tokio::test]
    async fn rejoin_replaces_previous_connection() {
        let registry = RoomRegistry::new();
        let (tx_a1, _rx_a1) = channel();
        let (tx_b, _rx_b) = channel();

        registry.join("a", "r1", tx_a1).await;
        registry.join("b", "r1", tx_b).await;

        // Same id reconnects; it must not be counted twice.
        let (tx_a2, _rx_a2) = channel();
        registry.join("a", "r1", tx_a2).await;

        assert_eq!(registry.connected_clients().await, 2);
        assert_eq!(registry.members("r1").await.len(), 2);
    }

    #[tokio::test]
    async fn stale_connection_cleanup_spares_replacement() {
        let registry = RoomRegistry::new();
        let (tx_a1, _rx_a1) = channel();
        registry.join("a", "r1", tx_a1.clone()).await;

        // Reconnect under the same id; the old connection's cleanup fires
        // afterwards and must not touch the live registration.
        let (tx_a2, mut rx_a2) = channel();
        registry.join("a", "r1", tx_a2).await;
        registry.leave_connection("a", &tx_a1).await;

        assert!(registry.route("a").await.is_some());
        assert_eq!(registry.role_of("a").await, Some(("r1".to_string(), Role::Host)));
        assert_eq!(registry.members("r1").await, vec!["a"]);

        registry.send_to("a", "hello".to_string()).await;
        assert_eq!(rx_a2.try_recv().unwrap(), "hello");
    }

    #[tokio::test]
    async fn leave_connection_removes_its_own_registration() {
        let registry = RoomRegistry::new();
        let (tx_a, _rx_a) = channel();
        registry.join("a", "r1", tx_a.clone()).await;

        registry.leave_connection("a", &tx_a).await;

        assert!(registry.route("a").await.is_none());
        assert!(registry.members("r1").await.is_empty());
    }

    #[tokio::test]
    async fn broadcast_excludes_sender() {
        let registry = RoomRegistry::new();
        let (tx_a, mut rx_a) = channel();
        let (tx_b, mut rx_b) = channel();

        registry.join("a", "r1", tx_a).await;
        registry.join("b", "r1", tx_b).await;

        registry.broadcast("r1", Some("a"), "hello").await;

        assert_eq!(rx_b.try_recv().unwrap(), "hello");
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_send_deregisters_client() {
        let registry = RoomRegistry::new();
        let (tx_a, rx_a) = channel();
        registry.join("a", "r1", tx_a).await;
        drop(rx_a);

        registry.send_to("a", "hello".to_string()).await;

        assert!(registry.route("a").await.is_none());
        assert!(registry.members("r1").await.is_empty());
    }
}
