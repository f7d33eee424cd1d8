//! WebSocket transport, the primary bidirectional channel.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use log::{debug, warn};
use riff_protocol::{ClientCommand, ServerMessage, TransportKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::error::ClientError;

use super::{Connector, INBOUND_BUFFER, Link, endpoint};

type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Convert an `http(s)://` base URL into the status socket URL.
pub(crate) fn socket_url(base_url: &str, token: &str) -> String {
    let base = if let Some(rest) = base_url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base_url.to_string()
    };
    format!(
        "{}?access_token={}",
        endpoint(&base, "/api/status/ws"),
        urlencoding::encode(token)
    )
}

pub struct WebSocketConnector {
    base_url: String,
}

impl WebSocketConnector {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
        }
    }
}

/// Read frames until the server's `connected` greeting.
async fn await_connected(socket: &mut Socket) -> Result<String, ClientError> {
    while let Some(frame) = socket.next().await {
        match frame? {
            Message::Text(text) => {
                return match serde_json::from_str::<ServerMessage>(text.as_str())? {
                    ServerMessage::Connected { connection_id, .. } => Ok(connection_id),
                    other => Err(ClientError::Protocol(format!(
                        "expected connected, got {:?}",
                        other
                    ))),
                };
            }
            Message::Close(_) => return Err(ClientError::Closed),
            _ => continue,
        }
    }
    Err(ClientError::Closed)
}

#[async_trait]
impl Connector for WebSocketConnector {
    fn kind(&self) -> TransportKind {
        TransportKind::WebSocket
    }

    async fn connect(&self, token: &str) -> Result<Box<dyn Link>, ClientError> {
        let url = socket_url(&self.base_url, token);
        let mut request = url
            .into_client_request()
            .map_err(|e| ClientError::Transport(format!("invalid socket url: {}", e)))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| ClientError::Unauthorized("token is not a valid header value".into()))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let (mut socket, _) = connect_async(request).await?;
        let connection_id = await_connected(&mut socket).await?;
        debug!("WebSocket connected as {}", connection_id);

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_BUFFER);
        let pump = tokio::spawn(pump(socket, outbound_rx, inbound_tx));

        Ok(Box::new(WebSocketLink {
            connection_id,
            outbound: outbound_tx,
            inbound: inbound_rx,
            pump: Some(pump),
        }))
    }
}

/// Move frames between the socket and the link's queues until either side closes.
async fn pump(
    socket: Socket,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    inbound: mpsc::Sender<Result<ServerMessage, ClientError>>,
) {
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            msg = outbound.recv() => {
                let Some(msg) = msg else {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                };
                let closing = matches!(msg, Message::Close(_));
                if let Err(e) = sink.send(msg).await {
                    let _ = inbound.send(Err(e.into())).await;
                    break;
                }
                if closing {
                    break;
                }
            }

            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ServerMessage>(text.as_str()) {
                        Ok(message) => {
                            if inbound.send(Ok(message)).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Skipping unparseable server message: {}", e),
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let _ = inbound.send(Err(e.into())).await;
                    break;
                }
            },
        }
    }
}

pub struct WebSocketLink {
    connection_id: String,
    outbound: mpsc::UnboundedSender<Message>,
    inbound: mpsc::Receiver<Result<ServerMessage, ClientError>>,
    pump: Option<JoinHandle<()>>,
}

#[async_trait]
impl Link for WebSocketLink {
    fn transport(&self) -> TransportKind {
        TransportKind::WebSocket
    }

    fn connection_id(&self) -> &str {
        &self.connection_id
    }

    async fn send(&mut self, command: ClientCommand) -> Result<(), ClientError> {
        let json = serde_json::to_string(&command)?;
        self.outbound
            .send(Message::Text(json.into()))
            .map_err(|_| ClientError::Closed)
    }

    async fn recv(&mut self) -> Option<Result<ServerMessage, ClientError>> {
        self.inbound.recv().await
    }

    async fn close(&mut self) {
        let _ = self.outbound.send(Message::Close(None));
        if let Some(pump) = self.pump.take() {
            let _ = pump.await;
        }
    }
}

impl Drop for WebSocketLink {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_url() {
        assert_eq!(
            socket_url("http://localhost:41830", "dev:alice"),
            "ws://localhost:41830/api/status/ws?access_token=dev%3Aalice"
        );
        assert_eq!(
            socket_url("https://riff.example/", "t"),
            "wss://riff.example/api/status/ws?access_token=t"
        );
    }
}
