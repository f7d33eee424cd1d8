//! Client side of the Riff agent-status channel.
//!
//! ```text
//! transport (ws | sse | long-poll)
//!        │  ServerMessage
//!        ▼
//! ConnectionManager ──StatusEvent──▶ StatusRegister ──StatusChange──▶ ElapsedTracker
//!        │                                │                                │
//!   ConnectionState                 on_status_change                  get_elapsed
//! ```
//!
//! [`StatusSession`] wires the pieces for one user; the components are public
//! for consumers that need only part of the pipeline.

pub mod backoff;
pub mod config;
pub mod elapsed;
pub mod error;
pub mod manager;
pub mod register;
pub mod session;
pub mod subscribers;
pub mod token;
pub mod transport;

pub use backoff::ReconnectPolicy;
pub use config::ClientConfig;
pub use elapsed::{Elapsed, ElapsedClock, ElapsedTracker};
pub use error::ClientError;
pub use manager::{ConnectionManager, ConnectionState, ManagerOptions};
pub use register::{StatusChange, StatusRegister};
pub use session::StatusSession;
pub use subscribers::{Subscribers, Subscription};
pub use token::{StaticToken, TokenFactory};
pub use transport::{
    Connector, Link, LongPollConnector, NegotiatingConnector, SseConnector, WebSocketConnector,
};
