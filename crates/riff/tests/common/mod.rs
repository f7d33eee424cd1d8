//! Test utilities and common setup.
#![allow(clippy::field_reassign_with_default)]
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use riff::api::{self, AppState, ChannelSettings};
use riff::auth::{AuthConfig, AuthState, DevUser, Role};
use riff::ws::StatusHub;

pub const TEST_SECRET: &str = "test-secret-for-integration-tests-minimum-32-chars";

fn dev_user(id: &str, name: &str, role: Role) -> DevUser {
    DevUser {
        id: id.to_string(),
        name: name.to_string(),
        role,
    }
}

/// Auth config with dev users and a JWT secret for token generation.
pub fn test_auth_config() -> AuthConfig {
    let mut config = AuthConfig::default();
    config.dev_mode = true;
    config.dev_users = vec![
        dev_user("alice", "Alice", Role::User),
        dev_user("bob", "Bob", Role::User),
        dev_user("agent", "Agent Runner", Role::Service),
    ];
    config.jwt_secret = Some(TEST_SECRET.to_string());
    config
}

/// Short timeouts so empty polls return quickly.
pub fn test_settings() -> ChannelSettings {
    ChannelSettings {
        ping_interval: Duration::from_secs(30),
        poll_timeout: Duration::from_millis(200),
        poll_idle_timeout: Duration::from_secs(60),
    }
}

pub fn test_state() -> AppState {
    AppState::new(
        AuthState::new(test_auth_config()),
        Arc::new(StatusHub::default()),
        test_settings(),
    )
}

/// Router plus the state behind it, for inspecting the hub.
pub fn test_app() -> (Router, AppState) {
    let state = test_state();
    (api::create_router(state.clone()), state)
}

pub fn bearer(user: &str) -> String {
    format!("Bearer dev:{}", user)
}
