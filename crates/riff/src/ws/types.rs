//! Hub-side connection types.

use chrono::{DateTime, Utc};
use riff_protocol::TransportKind;
use serde::Serialize;
use uuid::Uuid;

/// Opaque id assigned to a connection when the hub accepts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for ConnectionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Why a connection went away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectCause {
    /// Client closed the transport or an idle long-poll was reaped.
    Clean,
    /// Transport failed.
    Error(String),
}

impl std::fmt::Display for DisconnectCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisconnectCause::Clean => write!(f, "clean"),
            DisconnectCause::Error(reason) => write!(f, "error: {}", reason),
        }
    }
}

/// Diagnostic snapshot of a live connection.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub identity: String,
    pub transport: TransportKind,
    pub connected_at: DateTime<Utc>,
    pub groups: Vec<String>,
}
