//! Real-time status channel.
//!
//! The hub owns every live connection regardless of transport. Transports only
//! translate between their wire framing and the hub's per-connection queues.
//!
//! ```text
//!  collaborator ── POST /api/status/publish ──┐
//!                                             ▼
//!                                  ┌────────────────────┐
//!                                  │     StatusHub      │
//!                                  │  connections       │
//!                                  │  GroupDirectory    │
//!                                  └─────────┬──────────┘
//!               ┌────────────────────────────┼──────────────────────────┐
//!      WebSocket (handler)             SSE (sse)                 long-poll (polling)
//! ```

mod groups;
mod handler;
mod hub;
mod polling;
mod sse;
mod types;

pub use groups::GroupDirectory;
pub use handler::{apply_command, ws_handler};
pub use hub::{Accepted, CONNECTION_BUFFER_SIZE, HubError, StatusHub};
pub use polling::{PollRegistry, close_poll, open_poll, poll_messages, spawn_poll_reaper};
pub use sse::sse_handler;
pub use types::{ConnectionId, ConnectionInfo, DisconnectCause};
