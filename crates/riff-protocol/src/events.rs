//! Status events and the client-side status values they map to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

/// Status carried on the wire by a [`StatusEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum EventStatus {
    /// The agent is running an action.
    Processing,
    /// The action finished.
    Completed,
    /// The action failed.
    Error,
    /// Nothing is running.
    Idle,
}

impl EventStatus {
    /// `true` for statuses that end elapsed-time accrual.
    pub fn is_terminal(self) -> bool {
        !matches!(self, EventStatus::Processing)
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventStatus::Processing => write!(f, "processing"),
            EventStatus::Completed => write!(f, "completed"),
            EventStatus::Error => write!(f, "error"),
            EventStatus::Idle => write!(f, "idle"),
        }
    }
}

/// A status notification pushed from agent execution to a user's clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StatusEvent {
    pub status: EventStatus,

    /// Human-readable progress line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub message: Option<String>,

    /// Opaque payload. Never inspected by the channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub data: Option<Value>,

    /// Creation time. Advisory only.
    pub timestamp: DateTime<Utc>,
}

impl StatusEvent {
    /// Create an event stamped with the current time.
    pub fn new(status: EventStatus) -> Self {
        Self {
            status,
            message: None,
            data: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Value held by a client's status register.
///
/// `AwaitingApproval` is only ever set by the consuming application; no wire
/// status maps to it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum AgentStatus {
    #[default]
    Idle,
    Processing,
    AwaitingApproval,
    Error,
}

impl From<EventStatus> for AgentStatus {
    fn from(status: EventStatus) -> Self {
        match status {
            EventStatus::Processing => AgentStatus::Processing,
            EventStatus::Completed | EventStatus::Idle => AgentStatus::Idle,
            EventStatus::Error => AgentStatus::Error,
        }
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentStatus::Idle => write!(f, "idle"),
            AgentStatus::Processing => write!(f, "processing"),
            AgentStatus::AwaitingApproval => write!(f, "awaiting_approval"),
            AgentStatus::Error => write!(f, "error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_status_wire_names() {
        assert_eq!(
            serde_json::to_value(EventStatus::Processing).unwrap(),
            json!("processing")
        );
        assert_eq!(
            serde_json::from_value::<EventStatus>(json!("completed")).unwrap(),
            EventStatus::Completed
        );
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!EventStatus::Processing.is_terminal());
        assert!(EventStatus::Completed.is_terminal());
        assert!(EventStatus::Error.is_terminal());
        assert!(EventStatus::Idle.is_terminal());
    }

    #[test]
    fn test_agent_status_mapping() {
        assert_eq!(
            AgentStatus::from(EventStatus::Processing),
            AgentStatus::Processing
        );
        assert_eq!(AgentStatus::from(EventStatus::Completed), AgentStatus::Idle);
        assert_eq!(AgentStatus::from(EventStatus::Idle), AgentStatus::Idle);
        assert_eq!(AgentStatus::from(EventStatus::Error), AgentStatus::Error);
        assert_eq!(AgentStatus::default(), AgentStatus::Idle);
    }

    #[test]
    fn test_status_event_omits_empty_fields() {
        let event = StatusEvent::new(EventStatus::Idle);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["status"], "idle");
        assert!(value.get("message").is_none());
        assert!(value.get("data").is_none());
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_status_event_keeps_opaque_data() {
        let raw = json!({
            "status": "processing",
            "message": "Creating playlist",
            "data": { "tracks": [1, 2, 3], "nested": { "anything": null } },
            "timestamp": "2026-01-01T00:00:00Z"
        });
        let event: StatusEvent = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(event.message.as_deref(), Some("Creating playlist"));
        assert_eq!(event.data, Some(raw["data"].clone()));
    }
}
