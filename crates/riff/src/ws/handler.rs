//! WebSocket transport: the primary bidirectional status channel.

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use riff_protocol::{ClientCommand, ServerMessage, TransportKind};
use std::sync::Arc;
use std::time::Duration;

use crate::api::AppState;
use crate::auth::CurrentUser;

use super::hub::{HubError, StatusHub};
use super::types::{ConnectionId, DisconnectCause};

/// WebSocket upgrade handler.
///
/// GET /api/status/ws
pub async fn ws_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    ws: WebSocketUpgrade,
) -> Response {
    let user_id = user.id().to_string();
    debug!("WebSocket upgrade request from user {}", user_id);

    let hub = state.hub.clone();
    let ping_interval = state.settings.ping_interval;

    ws.on_upgrade(move |socket| handle_ws_connection(socket, hub, user_id, ping_interval))
}

/// Apply a command received from a connection.
///
/// Returns the reply to queue for the connection, if any. Failures are
/// reported to the caller only; the connection stays open.
pub async fn apply_command(
    hub: &StatusHub,
    conn_id: ConnectionId,
    cmd: ClientCommand,
) -> Result<Option<ServerMessage>, HubError> {
    match cmd {
        ClientCommand::JoinGroup { group } => {
            hub.join_group(conn_id, &group).await?;
            Ok(Some(ServerMessage::GroupJoined { group }))
        }
        ClientCommand::LeaveGroup { group } => {
            hub.leave_group(conn_id, &group).await?;
            Ok(Some(ServerMessage::GroupLeft { group }))
        }
        ClientCommand::Pong => {
            debug!("Pong from connection {}", conn_id);
            Ok(None)
        }
    }
}

async fn handle_ws_connection(
    socket: WebSocket,
    hub: Arc<StatusHub>,
    user_id: String,
    ping_interval: Duration,
) {
    let (mut sender, mut receiver) = socket.split();

    let accepted = match hub.accept(Some(&user_id), TransportKind::WebSocket) {
        Ok(accepted) => accepted,
        Err(e) => {
            warn!("Rejected WebSocket connection for user {}: {}", user_id, e);
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };
    let conn_id = accepted.id;
    let mut event_rx = accepted.receiver;

    let connected = ServerMessage::Connected {
        connection_id: conn_id.to_string(),
        transport: TransportKind::WebSocket,
    };
    let sent = match serde_json::to_string(&connected) {
        Ok(json) => sender.send(Message::Text(json.into())).await.map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    if let Err(e) = sent {
        error!("Failed to send connected message on {}: {}", conn_id, e);
        hub.disconnect(conn_id, DisconnectCause::Error(e)).await;
        return;
    }

    let send_task = tokio::spawn(async move {
        let mut ping = tokio::time::interval(ping_interval);
        // first tick completes immediately
        ping.tick().await;

        loop {
            tokio::select! {
                msg = event_rx.recv() => {
                    let Some(msg) = msg else { break };
                    let json = match serde_json::to_string(&msg) {
                        Ok(j) => j,
                        Err(e) => {
                            warn!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }

                _ = ping.tick() => {
                    let Ok(json) = serde_json::to_string(&ServerMessage::Ping) else { continue };
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let mut cause = DisconnectCause::Clean;
    while let Some(msg_result) = receiver.next().await {
        match msg_result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientCommand>(text.as_str()) {
                Ok(cmd) => {
                    let reply = match apply_command(&hub, conn_id, cmd).await {
                        Ok(reply) => reply,
                        Err(e) => {
                            warn!("Command from connection {} failed: {}", conn_id, e);
                            Some(ServerMessage::Error {
                                message: e.to_string(),
                            })
                        }
                    };
                    if let Some(reply) = reply {
                        hub.send_to_connection(conn_id, reply);
                    }
                }
                Err(e) => {
                    warn!(
                        "Failed to parse command from connection {}: {} - {}",
                        conn_id,
                        e,
                        text.as_str()
                    );
                    hub.send_to_connection(
                        conn_id,
                        ServerMessage::Error {
                            message: format!("invalid command: {}", e),
                        },
                    );
                }
            },
            Ok(Message::Binary(_)) => {
                debug!("Binary message on connection {}, ignoring", conn_id);
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!("User {} closed connection {}", user_id, conn_id);
                break;
            }
            Err(e) => {
                cause = DisconnectCause::Error(e.to_string());
                break;
            }
        }
    }

    send_task.abort();
    hub.disconnect(conn_id, cause).await;
}
