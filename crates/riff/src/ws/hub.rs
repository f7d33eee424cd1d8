//! Broadcast hub: owns live connections and routes status events to groups.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::{debug, info, warn};
use riff_protocol::{ServerMessage, StatusEvent, TransportKind, identity_of_group, user_group};
use tokio::sync::{RwLock, mpsc};
use tokio::sync::mpsc::error::TrySendError;

use super::groups::GroupDirectory;
use super::types::{ConnectionId, ConnectionInfo, DisconnectCause};

/// Default size of the per-connection send buffer.
pub const CONNECTION_BUFFER_SIZE: usize = 64;

/// Errors from hub operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HubError {
    /// No identity could be established for the connection attempt.
    #[error("connection has no authenticated identity")]
    Unauthenticated,

    #[error("unknown connection: {0}")]
    UnknownConnection(ConnectionId),

    /// The group does not belong to the connection's identity.
    #[error("group {group} is not accessible to {identity}")]
    Forbidden { identity: String, group: String },
}

/// A freshly accepted connection: its id and the queue of messages to write to it.
#[derive(Debug)]
pub struct Accepted {
    pub id: ConnectionId,
    pub receiver: mpsc::Receiver<ServerMessage>,
}

struct ConnectionEntry {
    identity: String,
    transport: TransportKind,
    connected_at: DateTime<Utc>,
    sender: mpsc::Sender<ServerMessage>,
}

/// Hub managing all status connections and their group memberships.
///
/// Membership mutation and broadcast snapshots are serialized through the
/// group directory lock. Delivery itself happens outside the lock with
/// `try_send`, so a slow or dead connection never stalls the others.
pub struct StatusHub {
    /// Connection ID -> connection entry
    connections: DashMap<ConnectionId, ConnectionEntry>,

    /// Group memberships
    groups: RwLock<GroupDirectory>,

    /// Per-connection queue capacity
    buffer: usize,
}

impl StatusHub {
    pub fn new(buffer: usize) -> Self {
        Self {
            connections: DashMap::new(),
            groups: RwLock::new(GroupDirectory::new()),
            buffer: buffer.max(1),
        }
    }

    /// Register a new connection.
    ///
    /// Rejects the attempt before creating any state when `identity` is absent
    /// or blank.
    pub fn accept(
        &self,
        identity: Option<&str>,
        transport: TransportKind,
    ) -> Result<Accepted, HubError> {
        let identity = identity
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(HubError::Unauthenticated)?;

        let (tx, rx) = mpsc::channel(self.buffer);
        let id = ConnectionId::new();
        let connected_at = Utc::now();
        self.connections.insert(
            id,
            ConnectionEntry {
                identity: identity.to_string(),
                transport,
                connected_at,
                sender: tx,
            },
        );

        info!(
            "Accepted connection {} for user {} at {} via {}",
            id,
            identity,
            connected_at.to_rfc3339(),
            transport
        );

        Ok(Accepted { id, receiver: rx })
    }

    /// Remove a connection and all of its group memberships.
    pub async fn disconnect(&self, id: ConnectionId, cause: DisconnectCause) {
        let Some((_, entry)) = self.connections.remove(&id) else {
            debug!("Disconnect for unknown connection {} ({})", id, cause);
            return;
        };

        let left = self.groups.write().await.remove_connection(id);

        match &cause {
            DisconnectCause::Clean => info!(
                "Connection {} for user {} closed cleanly (left {} group(s))",
                id,
                entry.identity,
                left.len()
            ),
            DisconnectCause::Error(reason) => warn!(
                "Connection {} for user {} dropped: {} (left {} group(s))",
                id,
                entry.identity,
                reason,
                left.len()
            ),
        }
    }

    /// Identity a connection was accepted for.
    pub fn identity_of(&self, id: ConnectionId) -> Option<String> {
        self.connections.get(&id).map(|e| e.identity.clone())
    }

    fn authorize_group(&self, id: ConnectionId, group: &str) -> Result<(), HubError> {
        let identity = self
            .identity_of(id)
            .ok_or(HubError::UnknownConnection(id))?;

        if identity_of_group(group) != Some(identity.as_str()) {
            return Err(HubError::Forbidden {
                identity,
                group: group.to_string(),
            });
        }
        Ok(())
    }

    /// Add a connection to a group. Joining twice is a no-op.
    ///
    /// Returns whether membership changed.
    pub async fn join_group(&self, id: ConnectionId, group: &str) -> Result<bool, HubError> {
        let mut groups = self.groups.write().await;
        // Checked under the lock so a concurrent disconnect can't leave a stale member.
        self.authorize_group(id, group)?;

        let joined = groups.join(id, group);
        if joined {
            info!("Connection {} joined group {}", id, group);
        } else {
            debug!("Connection {} already in group {}", id, group);
        }
        Ok(joined)
    }

    /// Remove a connection from a group. Leaving an unjoined group is a no-op.
    pub async fn leave_group(&self, id: ConnectionId, group: &str) -> Result<bool, HubError> {
        let mut groups = self.groups.write().await;
        if !self.connections.contains_key(&id) {
            return Err(HubError::UnknownConnection(id));
        }

        let left = groups.leave(id, group);
        if left {
            info!("Connection {} left group {}", id, group);
        } else {
            debug!("Connection {} was not in group {}", id, group);
        }
        Ok(left)
    }

    /// Push a status event to every connection currently in `group`.
    ///
    /// Returns the number of connections the event was queued for. A full or
    /// closed queue is skipped; delivery to the remaining members continues.
    pub async fn send_to_group(&self, group: &str, event: StatusEvent) -> usize {
        let members = self.groups.read().await.members(group);
        if members.is_empty() {
            debug!("No connections in group {}, dropping {} event", group, event.status);
            return 0;
        }

        let message = ServerMessage::AgentStatus { event };
        let mut delivered = 0;
        for id in members {
            if self.send_to_connection(id, message.clone()) {
                delivered += 1;
            }
        }

        debug!("Queued status event for {} connection(s) in group {}", delivered, group);
        delivered
    }

    /// Fire-and-forget entry point for agent execution.
    pub async fn publish(&self, identity: &str, event: StatusEvent) -> usize {
        self.send_to_group(&user_group(identity), event).await
    }

    /// Queue a message for a single connection without waiting.
    pub fn send_to_connection(&self, id: ConnectionId, message: ServerMessage) -> bool {
        let Some(sender) = self.connections.get(&id).map(|e| e.sender.clone()) else {
            debug!("Connection {} is gone, skipping message", id);
            return false;
        };

        match sender.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Send buffer full for connection {}, dropping message", id);
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Send queue closed for connection {}", id);
                false
            }
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub async fn group_members(&self, group: &str) -> Vec<ConnectionId> {
        self.groups.read().await.members(group)
    }

    pub async fn is_member(&self, id: ConnectionId, group: &str) -> bool {
        self.groups.read().await.is_member(id, group)
    }

    /// Snapshot of one connection for diagnostics.
    pub async fn connection_info(&self, id: ConnectionId) -> Option<ConnectionInfo> {
        let (identity, transport, connected_at) = {
            let entry = self.connections.get(&id)?;
            (entry.identity.clone(), entry.transport, entry.connected_at)
        };
        let groups = self.groups.read().await.groups_of(id);
        Some(ConnectionInfo {
            id,
            identity,
            transport,
            connected_at,
            groups,
        })
    }
}

impl Default for StatusHub {
    fn default() -> Self {
        Self::new(CONNECTION_BUFFER_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riff_protocol::EventStatus;
    use std::sync::Arc;

    fn event(message: &str) -> StatusEvent {
        StatusEvent::new(EventStatus::Processing).with_message(message)
    }

    fn status_message(msg: ServerMessage) -> StatusEvent {
        match msg {
            ServerMessage::AgentStatus { event } => event,
            other => panic!("Expected agent status, got {:?}", other),
        }
    }

    #[test]
    fn test_accept_requires_identity() {
        let hub = StatusHub::default();
        assert_eq!(
            hub.accept(None, TransportKind::WebSocket).unwrap_err(),
            HubError::Unauthenticated
        );
        assert_eq!(
            hub.accept(Some("  "), TransportKind::WebSocket).unwrap_err(),
            HubError::Unauthenticated
        );
        assert_eq!(hub.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_send_reaches_group_members_only() {
        let hub = StatusHub::default();
        let mut alice = hub.accept(Some("alice"), TransportKind::WebSocket).unwrap();
        let mut alice_tab = hub.accept(Some("alice"), TransportKind::ServerSentEvents).unwrap();
        let mut bob = hub.accept(Some("bob"), TransportKind::WebSocket).unwrap();

        hub.join_group(alice.id, "user-alice").await.unwrap();
        hub.join_group(alice_tab.id, "user-alice").await.unwrap();
        hub.join_group(bob.id, "user-bob").await.unwrap();

        let delivered = hub.publish("alice", event("Creating playlist")).await;
        assert_eq!(delivered, 2);

        let got = status_message(alice.receiver.try_recv().unwrap());
        assert_eq!(got.message.as_deref(), Some("Creating playlist"));
        let got = status_message(alice_tab.receiver.try_recv().unwrap());
        assert_eq!(got.message.as_deref(), Some("Creating playlist"));
        assert!(bob.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_connection_must_join_to_receive() {
        let hub = StatusHub::default();
        let mut conn = hub.accept(Some("alice"), TransportKind::WebSocket).unwrap();

        assert_eq!(hub.publish("alice", event("before join")).await, 0);
        assert!(conn.receiver.try_recv().is_err());

        hub.join_group(conn.id, "user-alice").await.unwrap();
        assert_eq!(hub.publish("alice", event("after join")).await, 1);
        assert!(conn.receiver.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_left_connection_receives_nothing() {
        let hub = StatusHub::default();
        let mut stays = hub.accept(Some("alice"), TransportKind::WebSocket).unwrap();
        let mut leaves = hub.accept(Some("alice"), TransportKind::WebSocket).unwrap();
        hub.join_group(stays.id, "user-alice").await.unwrap();
        hub.join_group(leaves.id, "user-alice").await.unwrap();

        assert!(hub.leave_group(leaves.id, "user-alice").await.unwrap());
        assert!(!hub.leave_group(leaves.id, "user-alice").await.unwrap());

        assert_eq!(hub.publish("alice", event("x")).await, 1);
        assert!(stays.receiver.try_recv().is_ok());
        assert!(leaves.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_join_twice_is_noop() {
        let hub = StatusHub::default();
        let mut conn = hub.accept(Some("alice"), TransportKind::WebSocket).unwrap();
        assert!(hub.join_group(conn.id, "user-alice").await.unwrap());
        assert!(!hub.join_group(conn.id, "user-alice").await.unwrap());

        assert_eq!(hub.publish("alice", event("once")).await, 1);
        assert!(conn.receiver.try_recv().is_ok());
        assert!(conn.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_join_foreign_group_forbidden() {
        let hub = StatusHub::default();
        let conn = hub.accept(Some("mallory"), TransportKind::WebSocket).unwrap();

        let err = hub.join_group(conn.id, "user-alice").await.unwrap_err();
        assert_eq!(
            err,
            HubError::Forbidden {
                identity: "mallory".to_string(),
                group: "user-alice".to_string()
            }
        );
        assert!(hub.group_members("user-alice").await.is_empty());
    }

    #[tokio::test]
    async fn test_group_ops_on_unknown_connection() {
        let hub = StatusHub::default();
        let ghost = ConnectionId::new();
        assert_eq!(
            hub.join_group(ghost, "user-alice").await.unwrap_err(),
            HubError::UnknownConnection(ghost)
        );
        assert_eq!(
            hub.leave_group(ghost, "user-alice").await.unwrap_err(),
            HubError::UnknownConnection(ghost)
        );
    }

    #[tokio::test]
    async fn test_disconnect_removes_memberships() {
        let hub = StatusHub::default();
        let conn = hub.accept(Some("alice"), TransportKind::WebSocket).unwrap();
        hub.join_group(conn.id, "user-alice").await.unwrap();

        hub.disconnect(conn.id, DisconnectCause::Error("reset".to_string()))
            .await;

        assert_eq!(hub.connection_count(), 0);
        assert!(hub.group_members("user-alice").await.is_empty());
        assert_eq!(hub.publish("alice", event("x")).await, 0);
        assert!(hub.connection_info(conn.id).await.is_none());
    }

    #[tokio::test]
    async fn test_full_queue_does_not_block_others() {
        let hub = StatusHub::new(1);
        let mut slow = hub.accept(Some("alice"), TransportKind::LongPolling).unwrap();
        let mut fast = hub.accept(Some("alice"), TransportKind::WebSocket).unwrap();
        hub.join_group(slow.id, "user-alice").await.unwrap();
        hub.join_group(fast.id, "user-alice").await.unwrap();

        assert_eq!(hub.publish("alice", event("first")).await, 2);
        assert!(fast.receiver.try_recv().is_ok());

        // slow never drained its single slot
        assert_eq!(hub.publish("alice", event("second")).await, 1);
        let got = status_message(fast.receiver.try_recv().unwrap());
        assert_eq!(got.message.as_deref(), Some("second"));

        let got = status_message(slow.receiver.try_recv().unwrap());
        assert_eq!(got.message.as_deref(), Some("first"));
        assert!(slow.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_receiver_is_skipped() {
        let hub = StatusHub::default();
        let dead = hub.accept(Some("alice"), TransportKind::WebSocket).unwrap();
        let mut live = hub.accept(Some("alice"), TransportKind::WebSocket).unwrap();
        hub.join_group(dead.id, "user-alice").await.unwrap();
        hub.join_group(live.id, "user-alice").await.unwrap();
        drop(dead.receiver);

        assert_eq!(hub.publish("alice", event("x")).await, 1);
        assert!(live.receiver.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_membership_and_sends() {
        let hub = Arc::new(StatusHub::new(1024));
        let mut anchor = hub.accept(Some("alice"), TransportKind::WebSocket).unwrap();
        hub.join_group(anchor.id, "user-alice").await.unwrap();

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let hub = hub.clone();
            tasks.push(tokio::spawn(async move {
                for _ in 0..25 {
                    let conn = hub.accept(Some("alice"), TransportKind::WebSocket).unwrap();
                    hub.join_group(conn.id, "user-alice").await.unwrap();
                    hub.publish("alice", event("churn")).await;
                    hub.disconnect(conn.id, DisconnectCause::Clean).await;
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(hub.connection_count(), 1);
        assert_eq!(hub.group_members("user-alice").await, vec![anchor.id]);

        let mut received = 0;
        while anchor.receiver.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 200);
    }

    #[tokio::test]
    async fn test_connection_info() {
        let hub = StatusHub::default();
        let conn = hub.accept(Some("alice"), TransportKind::ServerSentEvents).unwrap();
        hub.join_group(conn.id, "user-alice").await.unwrap();

        let info = hub.connection_info(conn.id).await.unwrap();
        assert_eq!(info.identity, "alice");
        assert_eq!(info.transport, TransportKind::ServerSentEvents);
        assert_eq!(info.groups, vec!["user-alice".to_string()]);
    }
}
