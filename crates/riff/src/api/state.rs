//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::auth::AuthState;
use crate::config::AppConfig;
use crate::ws::{PollRegistry, StatusHub};

/// Transport timing derived from the server config.
#[derive(Debug, Clone)]
pub struct ChannelSettings {
    pub ping_interval: Duration,
    pub poll_timeout: Duration,
    pub poll_idle_timeout: Duration,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            poll_timeout: Duration::from_secs(25),
            poll_idle_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<StatusHub>,
    pub polls: Arc<PollRegistry>,
    pub auth: AuthState,
    pub settings: Arc<ChannelSettings>,
}

impl AppState {
    pub fn new(auth: AuthState, hub: Arc<StatusHub>, settings: ChannelSettings) -> Self {
        Self {
            hub,
            polls: Arc::new(PollRegistry::new()),
            auth,
            settings: Arc::new(settings),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let settings = ChannelSettings {
            ping_interval: config.server.ping_interval(),
            poll_timeout: config.server.poll_timeout(),
            poll_idle_timeout: config.server.poll_idle_timeout(),
        };
        Self::new(
            AuthState::new(config.auth.clone()),
            Arc::new(StatusHub::new(config.server.connection_buffer)),
            settings,
        )
    }
}
