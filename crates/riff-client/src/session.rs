//! Client facade: connection manager feeding the status register, which
//! drives the elapsed-time tracker.

use std::sync::Arc;

use log::debug;
use riff_protocol::{AgentStatus, StatusEvent};
use tokio::sync::watch;

use crate::config::ClientConfig;
use crate::elapsed::{Elapsed, ElapsedTracker};
use crate::error::ClientError;
use crate::manager::{ConnectionManager, ConnectionState, ManagerOptions};
use crate::register::{StatusChange, StatusRegister};
use crate::subscribers::Subscription;
use crate::token::TokenFactory;
use crate::transport::Connector;

/// One user's status session.
///
/// The register and tracker are owned here and only move through delivered
/// events, [`begin_request`](Self::begin_request),
/// [`await_approval`](Self::await_approval) and
/// [`reset_elapsed`](Self::reset_elapsed).
pub struct StatusSession {
    manager: ConnectionManager,
    register: Arc<StatusRegister>,
    tracker: Arc<ElapsedTracker>,
    _wiring: [Subscription; 2],
}

impl StatusSession {
    /// Session negotiating the transports listed in `config`.
    pub fn new(config: &ClientConfig, tokens: Arc<dyn TokenFactory>) -> Self {
        Self::with_connector(Arc::new(config.connector()), tokens, config)
    }

    pub fn with_connector(
        connector: Arc<dyn Connector>,
        tokens: Arc<dyn TokenFactory>,
        config: &ClientConfig,
    ) -> Self {
        let manager = ConnectionManager::new(connector, tokens, ManagerOptions::from(config));
        let register = Arc::new(StatusRegister::new());
        let tracker = Arc::new(ElapsedTracker::new(config.tick_interval()));

        // Registered before any consumer callback, so consumers always observe
        // the register already updated.
        let events = {
            let register = register.clone();
            manager.subscribe(move |event| {
                register.apply_event(event);
            })
        };
        let transitions = {
            let tracker = tracker.clone();
            register.subscribe(move |change| {
                debug!("Agent status {} -> {}", change.previous, change.current);
                tracker.on_transition(change.previous, change.current);
            })
        };

        Self {
            manager,
            register,
            tracker,
            _wiring: [events, transitions],
        }
    }

    /// Connect as `identity` and join its status group.
    pub async fn connect(&self, identity: &str) -> Result<(), ClientError> {
        self.manager.connect(identity).await
    }

    /// Leave, tear down the transport, and stop the elapsed ticker. The last
    /// displayed elapsed value stays readable.
    pub async fn disconnect(&self) {
        self.manager.disconnect().await;
        self.tracker.halt();
    }

    /// Mark the agent as processing before any event arrives.
    pub fn begin_request(&self) {
        self.register.set(AgentStatus::Processing);
    }

    pub fn await_approval(&self) {
        self.register.set(AgentStatus::AwaitingApproval);
    }

    pub fn status(&self) -> AgentStatus {
        self.register.status()
    }

    pub fn on_status_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&StatusChange) + Send + Sync + 'static,
    {
        self.register.subscribe(callback)
    }

    /// Raw status events, after the register has applied them.
    pub fn on_event<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&StatusEvent) + Send + Sync + 'static,
    {
        self.manager.subscribe(callback)
    }

    pub fn get_elapsed(&self) -> Elapsed {
        self.tracker.elapsed()
    }

    /// Clear the elapsed display regardless of status. Counting restarts on the
    /// next transition into processing.
    pub fn reset_elapsed(&self) {
        let generation = self.register.bump_generation();
        self.tracker.reset(generation);
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.manager.state()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.manager.watch_state()
    }

    pub async fn join_group(&self, group: &str) -> Result<(), ClientError> {
        self.manager.join_group(group).await
    }

    pub async fn leave_group(&self, group: &str) -> Result<(), ClientError> {
        self.manager.leave_group(group).await
    }
}
