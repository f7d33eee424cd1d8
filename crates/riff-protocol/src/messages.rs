//! Messages exchanged between a status client and the hub.
//!
//! The same JSON shapes are used on every transport: WebSocket text frames,
//! SSE `data:` lines and long-poll response arrays.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::events::StatusEvent;

// ============================================================================
// Server -> Client
// ============================================================================

/// Messages sent by the hub to a connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export)]
pub enum ServerMessage {
    /// Handshake completed; always the first message on a connection.
    Connected {
        connection_id: String,
        transport: TransportKind,
    },

    /// Agent status notification. The only event channel clients subscribe to.
    AgentStatus { event: StatusEvent },

    /// Group membership confirmed.
    GroupJoined { group: String },

    /// Group membership removed.
    GroupLeft { group: String },

    /// Keepalive.
    Ping,

    /// A command from this connection failed. Does not close the connection.
    Error { message: String },
}

// ============================================================================
// Client -> Server
// ============================================================================

/// Commands a connection may send to the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export)]
pub enum ClientCommand {
    JoinGroup { group: String },
    LeaveGroup { group: String },
    Pong,
}

// ============================================================================
// Transports
// ============================================================================

/// Transport a connection was negotiated over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum TransportKind {
    /// Bidirectional socket.
    #[serde(rename = "websocket")]
    WebSocket,
    /// Server-push stream; commands go over plain HTTP.
    #[serde(rename = "sse")]
    ServerSentEvents,
    /// Repeated long-poll requests.
    LongPolling,
}

impl TransportKind {
    /// Order in which a client tries transports.
    pub fn negotiation_order() -> [TransportKind; 3] {
        [
            TransportKind::WebSocket,
            TransportKind::ServerSentEvents,
            TransportKind::LongPolling,
        ]
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::WebSocket => write!(f, "websocket"),
            TransportKind::ServerSentEvents => write!(f, "sse"),
            TransportKind::LongPolling => write!(f, "long_polling"),
        }
    }
}

impl std::str::FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "websocket" | "ws" => Ok(TransportKind::WebSocket),
            "sse" | "server_sent_events" => Ok(TransportKind::ServerSentEvents),
            "long_polling" | "polling" | "poll" => Ok(TransportKind::LongPolling),
            _ => Err(format!("unknown transport: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventStatus;
    use serde_json::json;

    #[test]
    fn test_server_message_tags() {
        let msg = ServerMessage::Connected {
            connection_id: "abc".to_string(),
            transport: TransportKind::WebSocket,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "connected");
        assert_eq!(value["transport"], "websocket");

        let value = serde_json::to_value(ServerMessage::Ping).unwrap();
        assert_eq!(value, json!({ "type": "ping" }));
    }

    #[test]
    fn test_agent_status_message_shape() {
        let msg = ServerMessage::AgentStatus {
            event: StatusEvent::new(EventStatus::Processing).with_message("Deduplicating"),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "agent_status");
        assert_eq!(value["event"]["status"], "processing");
        assert_eq!(value["event"]["message"], "Deduplicating");
    }

    #[test]
    fn test_client_command_parse() {
        let cmd: ClientCommand =
            serde_json::from_value(json!({ "type": "join_group", "group": "user-bob" })).unwrap();
        assert_eq!(
            cmd,
            ClientCommand::JoinGroup {
                group: "user-bob".to_string()
            }
        );

        let cmd: ClientCommand = serde_json::from_value(json!({ "type": "pong" })).unwrap();
        assert_eq!(cmd, ClientCommand::Pong);

        assert!(serde_json::from_value::<ClientCommand>(json!({ "type": "send" })).is_err());
    }

    #[test]
    fn test_transport_parse() {
        assert_eq!("ws".parse::<TransportKind>(), Ok(TransportKind::WebSocket));
        assert_eq!(
            "SSE".parse::<TransportKind>(),
            Ok(TransportKind::ServerSentEvents)
        );
        assert_eq!(
            "long_polling".parse::<TransportKind>(),
            Ok(TransportKind::LongPolling)
        );
        assert!("carrier-pigeon".parse::<TransportKind>().is_err());
    }

    #[test]
    fn test_negotiation_order() {
        assert_eq!(
            TransportKind::negotiation_order(),
            [
                TransportKind::WebSocket,
                TransportKind::ServerSentEvents,
                TransportKind::LongPolling
            ]
        );
    }
}
