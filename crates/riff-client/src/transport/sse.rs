//! Server-Sent Events transport, the first fallback.
//!
//! Messages arrive on the event stream; group commands go out as HTTP
//! requests against the connection id from the `connected` event.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use log::{debug, warn};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest_eventsource::{Event, EventSource, retry::Never};
use riff_protocol::{ClientCommand, ServerMessage, TransportKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::ClientError;

use super::http::HttpGroups;
use super::{Connector, INBOUND_BUFFER, Link, endpoint};

pub struct SseConnector {
    base_url: String,
    http: reqwest::Client,
}

impl SseConnector {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            http: reqwest::Client::new(),
        }
    }
}

fn parse(data: &str) -> Result<ServerMessage, ClientError> {
    serde_json::from_str(data).map_err(ClientError::from)
}

/// Read events until the `connected` greeting.
async fn await_connected(source: &mut EventSource) -> Result<String, ClientError> {
    while let Some(event) = source.next().await {
        match event? {
            Event::Open => debug!("Event stream opened"),
            Event::Message(msg) => {
                return match parse(&msg.data)? {
                    ServerMessage::Connected { connection_id, .. } => Ok(connection_id),
                    other => Err(ClientError::Protocol(format!(
                        "expected connected, got {:?}",
                        other
                    ))),
                };
            }
        }
    }
    Err(ClientError::Closed)
}

#[async_trait]
impl Connector for SseConnector {
    fn kind(&self) -> TransportKind {
        TransportKind::ServerSentEvents
    }

    async fn connect(&self, token: &str) -> Result<Box<dyn Link>, ClientError> {
        let request = self
            .http
            .get(endpoint(&self.base_url, "/api/status/sse"))
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .header(ACCEPT, "text/event-stream");

        let mut source = EventSource::new(request)
            .map_err(|e| ClientError::Transport(format!("cannot build event stream: {}", e)))?;
        // Reconnection belongs to the connection manager.
        source.set_retry_policy(Box::new(Never));

        let connection_id = match await_connected(&mut source).await {
            Ok(id) => id,
            Err(e) => {
                source.close();
                return Err(e);
            }
        };
        debug!("SSE connected as {}", connection_id);

        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_BUFFER);
        let cancel = CancellationToken::new();
        let reader = tokio::spawn(read_events(source, inbound_tx, cancel.clone()));

        Ok(Box::new(SseLink {
            groups: HttpGroups::new(self.http.clone(), &self.base_url, token, &connection_id),
            connection_id,
            inbound: inbound_rx,
            cancel,
            reader: Some(reader),
        }))
    }
}

async fn read_events(
    mut source: EventSource,
    inbound: mpsc::Sender<Result<ServerMessage, ClientError>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = source.next() => match event {
                Some(Ok(Event::Open)) => {}
                Some(Ok(Event::Message(msg))) => match parse(&msg.data) {
                    Ok(message) => {
                        if inbound.send(Ok(message)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("Skipping unparseable server event: {}", e),
                },
                Some(Err(reqwest_eventsource::Error::StreamEnded)) | None => break,
                Some(Err(e)) => {
                    let _ = inbound.send(Err(e.into())).await;
                    break;
                }
            },
        }
    }
    source.close();
}

pub struct SseLink {
    connection_id: String,
    groups: HttpGroups,
    inbound: mpsc::Receiver<Result<ServerMessage, ClientError>>,
    cancel: CancellationToken,
    reader: Option<JoinHandle<()>>,
}

#[async_trait]
impl Link for SseLink {
    fn transport(&self) -> TransportKind {
        TransportKind::ServerSentEvents
    }

    fn connection_id(&self) -> &str {
        &self.connection_id
    }

    async fn send(&mut self, command: ClientCommand) -> Result<(), ClientError> {
        if self.reader.as_ref().is_none_or(|r| r.is_finished()) {
            return Err(ClientError::Closed);
        }
        self.groups.apply(command).await
    }

    async fn recv(&mut self) -> Option<Result<ServerMessage, ClientError>> {
        self.inbound.recv().await
    }

    async fn close(&mut self) {
        self.cancel.cancel();
        if let Some(reader) = self.reader.take() {
            let _ = tokio::time::timeout(Duration::from_secs(1), reader).await;
        }
    }
}

impl Drop for SseLink {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
