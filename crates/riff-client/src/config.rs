//! Client configuration.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use riff_protocol::TransportKind;
use serde::{Deserialize, Serialize};

use crate::backoff::{MAX_RECONNECT_ATTEMPTS, ReconnectPolicy};
use crate::transport::NegotiatingConnector;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server base URL, e.g. `http://127.0.0.1:41830`.
    pub base_url: String,
    /// Transports to negotiate. Always tried in socket, SSE, polling order.
    pub transports: Vec<TransportKind>,
    pub max_reconnect_attempts: u32,
    /// Backoff step: the delay before reconnect attempt `n` is `n` steps.
    pub reconnect_step_ms: u64,
    pub reconnect_jitter: bool,
    pub handshake_timeout_ms: u64,
    /// Bound on the leave sent before teardown and on group operation replies.
    pub leave_timeout_ms: u64,
    /// Elapsed-time display refresh period while processing.
    pub tick_interval_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:41830".to_string(),
            transports: TransportKind::negotiation_order().to_vec(),
            max_reconnect_attempts: MAX_RECONNECT_ATTEMPTS,
            reconnect_step_ms: 1000,
            reconnect_jitter: true,
            handshake_timeout_ms: 10_000,
            leave_timeout_ms: 2_000,
            tick_interval_ms: 100,
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Load from a TOML file; missing keys fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading client config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing client config {}", path.display()))
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: self.max_reconnect_attempts,
            step: Duration::from_millis(self.reconnect_step_ms),
            jitter: self.reconnect_jitter,
        }
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn leave_timeout(&self) -> Duration {
        Duration::from_millis(self.leave_timeout_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn connector(&self) -> NegotiatingConnector {
        NegotiatingConnector::for_kinds(&self.base_url, &self.transports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.tick_interval(), Duration::from_millis(100));
        assert_eq!(config.reconnect_policy().step, Duration::from_secs(1));
        assert_eq!(
            config.connector().kinds(),
            TransportKind::negotiation_order().to_vec()
        );
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.toml");
        fs::write(
            &path,
            r#"
base_url = "http://riff.local:9000"
transports = ["long_polling", "sse"]
reconnect_jitter = false
"#,
        )
        .unwrap();

        let config = ClientConfig::from_file(&path).unwrap();
        assert_eq!(config.base_url, "http://riff.local:9000");
        assert!(!config.reconnect_policy().jitter);
        assert_eq!(config.leave_timeout_ms, 2_000);
        assert_eq!(
            config.connector().kinds(),
            vec![TransportKind::ServerSentEvents, TransportKind::LongPolling]
        );
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ClientConfig::from_file(&dir.path().join("nope.toml")).is_err());
    }
}
