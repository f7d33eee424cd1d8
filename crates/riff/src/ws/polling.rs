//! Long-polling transport, the last negotiation fallback.
//!
//! A poll connection is a hub connection whose outbound queue is drained by
//! repeated `GET` requests instead of a socket.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use dashmap::DashMap;
use log::{debug, info};
use riff_protocol::{ServerMessage, TransportKind};
use tokio::sync::{Mutex, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::api::{ApiError, ApiResult, AppState};
use crate::auth::CurrentUser;

use super::hub::StatusHub;
use super::types::{ConnectionId, DisconnectCause};

/// Most messages returned by a single poll.
const MAX_BATCH: usize = 64;

struct PollSlot {
    identity: String,
    receiver: Mutex<mpsc::Receiver<ServerMessage>>,
    last_seen: std::sync::Mutex<Instant>,
}

impl PollSlot {
    fn touch(&self) {
        *self.last_seen.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .elapsed()
    }
}

/// Outbound queues of open long-poll connections.
#[derive(Default)]
pub struct PollRegistry {
    slots: DashMap<ConnectionId, Arc<PollSlot>>,
}

impl PollRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, id: ConnectionId, identity: &str, receiver: mpsc::Receiver<ServerMessage>) {
        self.slots.insert(
            id,
            Arc::new(PollSlot {
                identity: identity.to_string(),
                receiver: Mutex::new(receiver),
                last_seen: std::sync::Mutex::new(Instant::now()),
            }),
        );
    }

    /// Look up a slot owned by `identity`. Foreign slots are reported as missing.
    fn owned(&self, id: ConnectionId, identity: &str) -> Option<Arc<PollSlot>> {
        self.slots
            .get(&id)
            .map(|slot| slot.clone())
            .filter(|slot| slot.identity == identity)
    }

    fn remove(&self, id: ConnectionId) -> bool {
        self.slots.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Close every connection that has not been polled within `idle_timeout`.
    ///
    /// Returns the number of connections closed.
    pub async fn reap_idle(&self, hub: &StatusHub, idle_timeout: Duration) -> usize {
        let stale: Vec<ConnectionId> = self
            .slots
            .iter()
            .filter(|entry| entry.value().idle_for() >= idle_timeout)
            .map(|entry| *entry.key())
            .collect();

        for id in &stale {
            self.remove(*id);
            hub.disconnect(*id, DisconnectCause::Error("long-poll idle timeout".to_string()))
                .await;
        }
        stale.len()
    }
}

/// Periodically reap idle long-poll connections until `cancel` fires.
pub fn spawn_poll_reaper(
    polls: Arc<PollRegistry>,
    hub: Arc<StatusHub>,
    idle_timeout: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(idle_timeout / 2);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let reaped = polls.reap_idle(&hub, idle_timeout).await;
                    if reaped > 0 {
                        info!("Reaped {} idle long-poll connection(s)", reaped);
                    }
                }
            }
        }
        debug!("Long-poll reaper stopped");
    })
}

/// Open a long-poll connection.
///
/// POST /api/status/poll
pub async fn open_poll(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<ServerMessage>> {
    let accepted = state
        .hub
        .accept(Some(user.id()), TransportKind::LongPolling)?;
    state.polls.insert(accepted.id, user.id(), accepted.receiver);

    Ok(Json(ServerMessage::Connected {
        connection_id: accepted.id.to_string(),
        transport: TransportKind::LongPolling,
    }))
}

fn parse_id(raw: &str) -> ApiResult<ConnectionId> {
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("invalid connection id: {}", raw)))
}

/// Wait for queued messages on a long-poll connection.
///
/// GET /api/status/poll/{id}
pub async fn poll_messages(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<ServerMessage>>> {
    let id = parse_id(&id)?;
    let slot = state
        .polls
        .owned(id, user.id())
        .ok_or_else(|| ApiError::gone(format!("poll connection {} is closed", id)))?;

    let mut receiver = slot
        .receiver
        .try_lock()
        .map_err(|_| ApiError::conflict(format!("poll already in progress for {}", id)))?;
    slot.touch();

    let mut batch = Vec::new();
    match tokio::time::timeout(state.settings.poll_timeout, receiver.recv()).await {
        Ok(Some(first)) => {
            batch.push(first);
            while batch.len() < MAX_BATCH {
                match receiver.try_recv() {
                    Ok(msg) => batch.push(msg),
                    Err(_) => break,
                }
            }
        }
        Ok(None) => {
            drop(receiver);
            state.polls.remove(id);
            return Err(ApiError::gone(format!("poll connection {} is closed", id)));
        }
        Err(_) => {}
    }

    slot.touch();
    Ok(Json(batch))
}

/// Close a long-poll connection.
///
/// DELETE /api/status/poll/{id}
pub async fn close_poll(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&id)?;
    if state.polls.owned(id, user.id()).is_none() {
        return Err(ApiError::not_found(format!("poll connection {}", id)));
    }
    state.polls.remove(id);
    state.hub.disconnect(id, DisconnectCause::Clean).await;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use riff_protocol::{EventStatus, StatusEvent};

    #[tokio::test(start_paused = true)]
    async fn test_reap_idle_closes_stale_connections() {
        let hub = StatusHub::default();
        let polls = PollRegistry::new();

        let stale = hub.accept(Some("alice"), TransportKind::LongPolling).unwrap();
        polls.insert(stale.id, "alice", stale.receiver);

        tokio::time::advance(Duration::from_secs(50)).await;

        let fresh = hub.accept(Some("alice"), TransportKind::LongPolling).unwrap();
        polls.insert(fresh.id, "alice", fresh.receiver);

        tokio::time::advance(Duration::from_secs(15)).await;

        let reaped = polls.reap_idle(&hub, Duration::from_secs(60)).await;
        assert_eq!(reaped, 1);
        assert_eq!(polls.len(), 1);
        assert_eq!(hub.connection_count(), 1);
        assert!(hub.identity_of(fresh.id).is_some());
    }

    #[tokio::test]
    async fn test_owned_hides_foreign_slots() {
        let hub = StatusHub::default();
        let polls = PollRegistry::new();
        let conn = hub.accept(Some("alice"), TransportKind::LongPolling).unwrap();
        polls.insert(conn.id, "alice", conn.receiver);

        assert!(polls.owned(conn.id, "alice").is_some());
        assert!(polls.owned(conn.id, "bob").is_none());
    }

    #[tokio::test]
    async fn test_slot_receives_group_events() {
        let hub = StatusHub::default();
        let polls = PollRegistry::new();
        let conn = hub.accept(Some("alice"), TransportKind::LongPolling).unwrap();
        polls.insert(conn.id, "alice", conn.receiver);
        hub.join_group(conn.id, "user-alice").await.unwrap();

        hub.publish("alice", StatusEvent::new(EventStatus::Processing))
            .await;

        let slot = polls.owned(conn.id, "alice").unwrap();
        let msg = slot.receiver.lock().await.try_recv().unwrap();
        assert!(matches!(msg, ServerMessage::AgentStatus { .. }));
    }
}
