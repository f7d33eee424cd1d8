//! Client error taxonomy.

use reqwest::StatusCode;
use tokio_tungstenite::tungstenite;

/// Errors surfaced by transports and the connection manager.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ClientError {
    /// The server rejected the token. Fatal to the connect attempt.
    #[error("authentication rejected: {0}")]
    Unauthorized(String),

    /// Network or handshake failure. Recoverable by reconnecting.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("connection closed")]
    Closed,

    #[error("not connected")]
    NotConnected,

    /// The server sent something that does not parse as a protocol message.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("token factory failed: {0}")]
    TokenFactory(String),
}

impl ClientError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Unauthorized(_))
    }

    /// Classify an HTTP status returned by a handshake or group request.
    pub(crate) fn from_status(status: StatusCode, context: &str) -> Self {
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            ClientError::Unauthorized(format!("{} returned {}", context, status))
        } else {
            ClientError::Transport(format!("{} returned {}", context, status))
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => ClientError::from_status(status, "request"),
            None => ClientError::Transport(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Protocol(err.to_string())
    }
}

impl From<tungstenite::Error> for ClientError {
    fn from(err: tungstenite::Error) -> Self {
        match &err {
            tungstenite::Error::Http(response) => {
                ClientError::from_status(response.status(), "websocket handshake")
            }
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                ClientError::Closed
            }
            _ => ClientError::Transport(err.to_string()),
        }
    }
}

impl From<reqwest_eventsource::Error> for ClientError {
    fn from(err: reqwest_eventsource::Error) -> Self {
        match err {
            reqwest_eventsource::Error::InvalidStatusCode(status, _) => {
                ClientError::from_status(status, "event stream")
            }
            reqwest_eventsource::Error::StreamEnded => ClientError::Closed,
            other => ClientError::Transport(other.to_string()),
        }
    }
}
