//! Server-Sent Events transport.
//!
//! One-way stream of `ServerMessage` frames. Group commands arrive out of band
//! through the connection endpoints in `api::handlers`.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt, stream};
use log::{debug, warn};
use riff_protocol::{ServerMessage, TransportKind};
use tokio_stream::wrappers::ReceiverStream;

use crate::api::{ApiError, AppState};
use crate::auth::CurrentUser;

use super::hub::StatusHub;
use super::types::{ConnectionId, DisconnectCause};

/// Removes the connection from the hub once the response stream is dropped.
struct DisconnectGuard {
    hub: Arc<StatusHub>,
    id: ConnectionId,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        let hub = self.hub.clone();
        let id = self.id;
        debug!("SSE stream for connection {} dropped", id);
        // Drop can't await; hand the async removal to the runtime.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                hub.disconnect(id, DisconnectCause::Clean).await;
            });
        }
    }
}

fn to_event(message: &ServerMessage) -> Option<Event> {
    match serde_json::to_string(message) {
        Ok(json) => Some(Event::default().data(json)),
        Err(e) => {
            warn!("Failed to serialize SSE message: {}", e);
            None
        }
    }
}

/// SSE stream handler.
///
/// GET /api/status/sse
pub async fn sse_handler(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let accepted = state
        .hub
        .accept(Some(user.id()), TransportKind::ServerSentEvents)?;
    let id = accepted.id;

    let guard = DisconnectGuard {
        hub: state.hub.clone(),
        id,
    };

    let connected = ServerMessage::Connected {
        connection_id: id.to_string(),
        transport: TransportKind::ServerSentEvents,
    };

    let stream = stream::once(async move { connected })
        .chain(ReceiverStream::new(accepted.receiver))
        .filter_map(move |msg| {
            // The guard lives as long as the stream does.
            let _keep = &guard;
            std::future::ready(to_event(&msg).map(Ok))
        });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
