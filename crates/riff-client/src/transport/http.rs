//! Group operations over plain HTTP, for transports without an upstream
//! channel.

use log::debug;
use reqwest::header::AUTHORIZATION;
use riff_protocol::ClientCommand;
use serde_json::json;

use crate::error::ClientError;

use super::endpoint;

#[derive(Clone)]
pub(crate) struct HttpGroups {
    http: reqwest::Client,
    base_url: String,
    token: String,
    connection_id: String,
}

impl HttpGroups {
    pub(crate) fn new(
        http: reqwest::Client,
        base_url: &str,
        token: &str,
        connection_id: &str,
    ) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
            token: token.to_string(),
            connection_id: connection_id.to_string(),
        }
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn connection_id(&self) -> &str {
        &self.connection_id
    }

    pub(crate) fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    pub(crate) fn url(&self, path: &str) -> String {
        endpoint(&self.base_url, path)
    }

    pub(crate) async fn apply(&self, command: ClientCommand) -> Result<(), ClientError> {
        let groups_path = format!(
            "/api/status/connections/{}/groups",
            urlencoding::encode(&self.connection_id)
        );

        let request = match &command {
            ClientCommand::JoinGroup { group } => self
                .http
                .post(self.url(&groups_path))
                .json(&json!({ "group": group })),
            ClientCommand::LeaveGroup { group } => self.http.delete(self.url(&format!(
                "{}/{}",
                groups_path,
                urlencoding::encode(group)
            ))),
            // Keepalive is only meaningful on the socket transport.
            ClientCommand::Pong => return Ok(()),
        };

        let response = request.header(AUTHORIZATION, self.bearer()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::from_status(status, "group operation"));
        }

        debug!(
            "Applied {:?} for connection {} over HTTP",
            command, self.connection_id
        );
        Ok(())
    }
}
