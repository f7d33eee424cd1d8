//! Wire types for the Riff agent-status channel.
//!
//! ```text
//! Agent execution --publish(user, StatusEvent)--> Hub --[group user-{id}]--> Browser client(s)
//!                                                  ^                               |
//!                                                  +------ join/leave group -------+
//! ```
//!
//! The hub never interprets an event beyond routing it: `data` stays opaque JSON
//! end to end, and `timestamp` is advisory (delivery order is what clients rely on).

pub mod events;
pub mod groups;
pub mod messages;

pub use events::{AgentStatus, EventStatus, StatusEvent};
pub use groups::{GROUP_PREFIX, identity_of_group, user_group};
pub use messages::{ClientCommand, ServerMessage, TransportKind};
