//! Long-polling transport, the last fallback.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use riff_protocol::{ClientCommand, ServerMessage, TransportKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::ClientError;

use super::http::HttpGroups;
use super::{Connector, INBOUND_BUFFER, Link, endpoint};

/// Upper bound on a single poll request; the server answers well before this.
const POLL_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct LongPollConnector {
    base_url: String,
    http: reqwest::Client,
}

impl LongPollConnector {
    pub fn new(base_url: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(POLL_REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });
        Self {
            base_url: base_url.to_string(),
            http,
        }
    }
}

#[async_trait]
impl Connector for LongPollConnector {
    fn kind(&self) -> TransportKind {
        TransportKind::LongPolling
    }

    async fn connect(&self, token: &str) -> Result<Box<dyn Link>, ClientError> {
        let response = self
            .http
            .post(endpoint(&self.base_url, "/api/status/poll"))
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::from_status(status, "poll handshake"));
        }

        let connection_id = match response.json::<ServerMessage>().await? {
            ServerMessage::Connected { connection_id, .. } => connection_id,
            other => {
                return Err(ClientError::Protocol(format!(
                    "expected connected, got {:?}",
                    other
                )));
            }
        };
        debug!("Long-poll connected as {}", connection_id);

        let groups = HttpGroups::new(self.http.clone(), &self.base_url, token, &connection_id);
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_BUFFER);
        let cancel = CancellationToken::new();
        let poller = tokio::spawn(poll_loop(groups.clone(), inbound_tx, cancel.clone()));

        Ok(Box::new(LongPollLink {
            connection_id,
            groups,
            inbound: inbound_rx,
            cancel,
            poller: Some(poller),
        }))
    }
}

fn poll_path(connection_id: &str) -> String {
    format!("/api/status/poll/{}", urlencoding::encode(connection_id))
}

async fn poll_once(groups: &HttpGroups) -> Result<Option<Vec<ServerMessage>>, ClientError> {
    let response = groups
        .http()
        .get(groups.url(&poll_path(groups.connection_id())))
        .header(AUTHORIZATION, groups.bearer())
        .send()
        .await?;

    match response.status() {
        StatusCode::GONE => Ok(None),
        status if status.is_success() => Ok(Some(response.json().await?)),
        status => Err(ClientError::from_status(status, "poll")),
    }
}

async fn poll_loop(
    groups: HttpGroups,
    inbound: mpsc::Sender<Result<ServerMessage, ClientError>>,
    cancel: CancellationToken,
) {
    loop {
        let batch = tokio::select! {
            _ = cancel.cancelled() => break,
            batch = poll_once(&groups) => batch,
        };

        match batch {
            Ok(Some(messages)) => {
                for msg in messages {
                    if inbound.send(Ok(msg)).await.is_err() {
                        return;
                    }
                }
            }
            Ok(None) => {
                debug!("Poll connection {} closed by server", groups.connection_id());
                break;
            }
            Err(e) => {
                let _ = inbound.send(Err(e)).await;
                break;
            }
        }
    }
}

pub struct LongPollLink {
    connection_id: String,
    groups: HttpGroups,
    inbound: mpsc::Receiver<Result<ServerMessage, ClientError>>,
    cancel: CancellationToken,
    poller: Option<JoinHandle<()>>,
}

#[async_trait]
impl Link for LongPollLink {
    fn transport(&self) -> TransportKind {
        TransportKind::LongPolling
    }

    fn connection_id(&self) -> &str {
        &self.connection_id
    }

    async fn send(&mut self, command: ClientCommand) -> Result<(), ClientError> {
        if self.poller.as_ref().is_none_or(|p| p.is_finished()) {
            return Err(ClientError::Closed);
        }
        self.groups.apply(command).await
    }

    async fn recv(&mut self) -> Option<Result<ServerMessage, ClientError>> {
        self.inbound.recv().await
    }

    async fn close(&mut self) {
        self.cancel.cancel();
        if let Some(poller) = self.poller.take() {
            let _ = poller.await;
        }

        let result = self
            .groups
            .http()
            .delete(self.groups.url(&poll_path(&self.connection_id)))
            .header(AUTHORIZATION, self.groups.bearer())
            .send()
            .await;
        if let Err(e) = result {
            debug!("Closing poll connection {} failed: {}", self.connection_id, e);
        }
    }
}

impl Drop for LongPollLink {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
