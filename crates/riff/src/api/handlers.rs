//! HTTP handlers for health, publishing and out-of-band group operations.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use riff_protocol::{ServerMessage, StatusEvent};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::auth::{CurrentUser, RequireService};
use crate::ws::ConnectionId;

use super::error::{ApiError, ApiResult};
use super::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub connections: usize,
}

/// Health check endpoint.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        connections: state.hub.connection_count(),
    })
}

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub user_id: String,
    pub event: StatusEvent,
}

#[derive(Debug, Serialize)]
pub struct PublishResponse {
    pub delivered: usize,
}

/// Publish a status event to every connection of one identity.
///
/// Delivery is best-effort; `delivered` counts queued messages, not receipts.
#[instrument(skip(state, caller, request), fields(user_id = %request.user_id, status = %request.event.status))]
pub async fn publish(
    State(state): State<AppState>,
    RequireService(caller): RequireService,
    Json(request): Json<PublishRequest>,
) -> ApiResult<(StatusCode, Json<PublishResponse>)> {
    let user_id = request.user_id.trim();
    if user_id.is_empty() {
        return Err(ApiError::bad_request("user_id must not be empty"));
    }

    let delivered = state.hub.publish(user_id, request.event).await;
    info!(publisher = %caller.id(), delivered, "Published status event");

    Ok((StatusCode::ACCEPTED, Json(PublishResponse { delivered })))
}

#[derive(Debug, Deserialize)]
pub struct GroupRequest {
    pub group: String,
}

/// Resolve a path id to a connection owned by the caller.
///
/// Connections of other identities are indistinguishable from unknown ones.
fn owned_connection(state: &AppState, user: &CurrentUser, raw: &str) -> ApiResult<ConnectionId> {
    let id: ConnectionId = raw
        .parse()
        .map_err(|_| ApiError::bad_request(format!("invalid connection id: {}", raw)))?;

    match state.hub.identity_of(id) {
        Some(identity) if identity == user.id() => Ok(id),
        _ => Err(ApiError::not_found(format!("connection {}", id))),
    }
}

/// Join a group on behalf of an SSE or long-poll connection.
///
/// POST /api/status/connections/{id}/groups
#[instrument(skip(state, user, request), fields(user_id = %user.id()))]
pub async fn join_group(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(request): Json<GroupRequest>,
) -> ApiResult<Json<ServerMessage>> {
    let id = owned_connection(&state, &user, &id)?;
    state.hub.join_group(id, &request.group).await?;
    Ok(Json(ServerMessage::GroupJoined {
        group: request.group,
    }))
}

/// Leave a group on behalf of an SSE or long-poll connection.
///
/// DELETE /api/status/connections/{id}/groups/{group}
#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn leave_group(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((id, group)): Path<(String, String)>,
) -> ApiResult<Json<ServerMessage>> {
    let id = owned_connection(&state, &user, &id)?;
    state.hub.leave_group(id, &group).await?;
    Ok(Json(ServerMessage::GroupLeft { group }))
}
