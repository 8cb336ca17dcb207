//! Misskey `notes/create` client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;
use url::Url;

use super::DeliveryPort;
use crate::note::{Note, Visibility};
use crate::{RelayError, Result};

/// User agent string for API calls.
const USER_AGENT: &str = "feedrelay/0.1";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateNoteRequest<'a> {
    i: &'a str,
    text: &'a str,
    visibility: Visibility,
    local_only: bool,
}

/// Posts notes through the Misskey HTTP API.
pub struct MisskeyClient {
    client: Client,
    endpoint: Url,
    auth_token: String,
    local_only: bool,
}

impl MisskeyClient {
    /// Create a client for `host` (scheme optional, https assumed).
    pub fn new(
        host: &str,
        auth_token: impl Into<String>,
        local_only: bool,
        timeout: Duration,
    ) -> Result<Self> {
        let endpoint = notes_create_endpoint(host)?;
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| RelayError::Delivery(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            auth_token: auth_token.into(),
            local_only,
        })
    }

    /// The resolved `notes/create` URL.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl DeliveryPort for MisskeyClient {
    async fn post(&self, note: &Note) -> Result<()> {
        let payload = CreateNoteRequest {
            i: &self.auth_token,
            text: &note.text,
            visibility: note.visibility,
            local_only: self.local_only,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&payload)
            .send()
            .await
            .map_err(|e| RelayError::Delivery(format!("failed to send note: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::Delivery(format!(
                "Misskey API returned {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        debug!("Note posted to {}", self.endpoint);
        Ok(())
    }
}

/// Resolve `{host}/api/notes/create`, adding `https://` when no scheme is given.
fn notes_create_endpoint(host: &str) -> Result<Url> {
    let host = host.trim().trim_end_matches('/');
    if host.is_empty() {
        return Err(RelayError::Config("Misskey host is empty".to_string()));
    }

    let base = if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    };

    Url::parse(&format!("{}/api/notes/create", base))
        .map_err(|e| RelayError::Config(format!("invalid Misskey host {}: {}", host, e)))
}
