//! Client transports.
//!
//! A [`Connector`] performs the handshake and yields a [`Link`]; the link
//! carries commands out and server messages in until it closes. Every link
//! reads on a background task into a queue, so [`Link::recv`] is cancel safe.

mod http;
mod polling;
mod sse;
mod websocket;

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use riff_protocol::{ClientCommand, ServerMessage, TransportKind};

use crate::error::ClientError;

pub use polling::LongPollConnector;
pub use sse::SseConnector;
pub use websocket::WebSocketConnector;

/// Capacity of the queue between a link's reader task and `recv`.
pub(crate) const INBOUND_BUFFER: usize = 64;

/// An established connection to the hub.
#[async_trait]
pub trait Link: Send {
    fn transport(&self) -> TransportKind;

    /// Server-assigned connection id from the `connected` message.
    fn connection_id(&self) -> &str;

    async fn send(&mut self, command: ClientCommand) -> Result<(), ClientError>;

    /// Next server message. `None` once the link is closed.
    async fn recv(&mut self) -> Option<Result<ServerMessage, ClientError>>;

    async fn close(&mut self);
}

/// Opens links of one transport kind.
#[async_trait]
pub trait Connector: Send + Sync {
    fn kind(&self) -> TransportKind;

    async fn connect(&self, token: &str) -> Result<Box<dyn Link>, ClientError>;
}

/// Tries connectors in negotiation order until one succeeds.
///
/// An authentication failure ends negotiation at once: falling back would only
/// hide a rejected token behind a slower transport.
pub struct NegotiatingConnector {
    connectors: Vec<Arc<dyn Connector>>,
}

impl NegotiatingConnector {
    pub fn new(mut connectors: Vec<Arc<dyn Connector>>) -> Self {
        let order = TransportKind::negotiation_order();
        connectors.sort_by_key(|c| order.iter().position(|k| *k == c.kind()));
        Self { connectors }
    }

    /// Connectors for `kinds` against `base_url`.
    pub fn for_kinds(base_url: &str, kinds: &[TransportKind]) -> Self {
        let connectors = kinds
            .iter()
            .map(|kind| -> Arc<dyn Connector> {
                match kind {
                    TransportKind::WebSocket => Arc::new(WebSocketConnector::new(base_url)),
                    TransportKind::ServerSentEvents => Arc::new(SseConnector::new(base_url)),
                    TransportKind::LongPolling => Arc::new(LongPollConnector::new(base_url)),
                }
            })
            .collect();
        Self::new(connectors)
    }

    pub fn kinds(&self) -> Vec<TransportKind> {
        self.connectors.iter().map(|c| c.kind()).collect()
    }
}

#[async_trait]
impl Connector for NegotiatingConnector {
    fn kind(&self) -> TransportKind {
        self.connectors
            .first()
            .map(|c| c.kind())
            .unwrap_or(TransportKind::WebSocket)
    }

    async fn connect(&self, token: &str) -> Result<Box<dyn Link>, ClientError> {
        let mut last_error = ClientError::Transport("no transports configured".to_string());

        for connector in &self.connectors {
            match connector.connect(token).await {
                Ok(link) => {
                    debug!(
                        "Negotiated {} transport (connection {})",
                        link.transport(),
                        link.connection_id()
                    );
                    return Ok(link);
                }
                Err(e) if e.is_unauthorized() => return Err(e),
                Err(e) => {
                    warn!("{} transport unavailable: {}", connector.kind(), e);
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}

/// Join `base_url` and an absolute `path`, tolerating a trailing slash.
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Scripted {
        kind: TransportKind,
        result: Result<(), ClientError>,
        calls: Arc<Mutex<Vec<TransportKind>>>,
    }

    struct NullLink(TransportKind);

    #[async_trait]
    impl Link for NullLink {
        fn transport(&self) -> TransportKind {
            self.0
        }

        fn connection_id(&self) -> &str {
            "null"
        }

        async fn send(&mut self, _command: ClientCommand) -> Result<(), ClientError> {
            Ok(())
        }

        async fn recv(&mut self) -> Option<Result<ServerMessage, ClientError>> {
            None
        }

        async fn close(&mut self) {}
    }

    #[async_trait]
    impl Connector for Scripted {
        fn kind(&self) -> TransportKind {
            self.kind
        }

        async fn connect(&self, _token: &str) -> Result<Box<dyn Link>, ClientError> {
            self.calls.lock().unwrap().push(self.kind);
            self.result.clone()?;
            Ok(Box::new(NullLink(self.kind)))
        }
    }

    fn scripted(
        kind: TransportKind,
        result: Result<(), ClientError>,
        calls: &Arc<Mutex<Vec<TransportKind>>>,
    ) -> Arc<dyn Connector> {
        Arc::new(Scripted {
            kind,
            result,
            calls: calls.clone(),
        })
    }

    #[tokio::test]
    async fn test_falls_back_in_negotiation_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        // Registered out of order on purpose.
        let negotiator = NegotiatingConnector::new(vec![
            scripted(TransportKind::LongPolling, Ok(()), &calls),
            scripted(
                TransportKind::WebSocket,
                Err(ClientError::Transport("refused".into())),
                &calls,
            ),
            scripted(
                TransportKind::ServerSentEvents,
                Err(ClientError::Transport("refused".into())),
                &calls,
            ),
        ]);

        let link = negotiator.connect("t").await.unwrap();
        assert_eq!(link.transport(), TransportKind::LongPolling);
        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                TransportKind::WebSocket,
                TransportKind::ServerSentEvents,
                TransportKind::LongPolling
            ]
        );
    }

    #[tokio::test]
    async fn test_unauthorized_stops_negotiation() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let negotiator = NegotiatingConnector::new(vec![
            scripted(
                TransportKind::WebSocket,
                Err(ClientError::Unauthorized("bad token".into())),
                &calls,
            ),
            scripted(TransportKind::ServerSentEvents, Ok(()), &calls),
        ]);

        let err = negotiator.connect("t").await.err().unwrap();
        assert!(err.is_unauthorized());
        assert_eq!(*calls.lock().unwrap(), vec![TransportKind::WebSocket]);
    }

    #[tokio::test]
    async fn test_reports_last_error_when_all_fail() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let negotiator = NegotiatingConnector::new(vec![scripted(
            TransportKind::WebSocket,
            Err(ClientError::Transport("refused".into())),
            &calls,
        )]);
        assert_eq!(
            negotiator.connect("t").await.err(),
            Some(ClientError::Transport("refused".into()))
        );
    }

    #[test]
    fn test_endpoint_join() {
        assert_eq!(
            endpoint("http://localhost:41830/", "/api/status/poll"),
            "http://localhost:41830/api/status/poll"
        );
    }
}
