//! Session bridge HTTP client.

use crate::error::SessionError;
use crate::types::*;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use urlencoding::encode;

/// REST client for the session bridge sidecar.
#[derive(Clone)]
pub struct BridgeClient {
    client: Client,
    base_url: String,
}

impl BridgeClient {
    /// Create a new bridge client.
    pub fn new(base_url: impl Into<String>) -> Result<Self, SessionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Check if the bridge is healthy.
    pub async fn health_check(&self) -> bool {
        self.client
            .get(format!("{}/v1/health", self.base_url))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    /// Open a session backed by the credentials under `auth_dir`.
    #[instrument(skip(self))]
    pub async fn open_session(&self, auth_dir: &str) -> Result<String, SessionError> {
        let request = OpenSessionRequest {
            auth_dir: auth_dir.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/v1/sessions", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Bridge refused to open session");
            return Err(SessionError::Api(format!(
                "Open session failed: {} - {}",
                status, body
            )));
        }

        let opened: OpenSessionResponse = response.json().await?;
        debug!(session_id = %opened.session_id, "Session opened");
        Ok(opened.session_id)
    }

    /// Fetch pending events for a session.
    pub async fn poll_events(&self, session_id: &str) -> Result<Vec<BridgeEvent>, SessionError> {
        let response = self
            .client
            .get(format!(
                "{}/v1/sessions/{}/events",
                self.base_url,
                encode(session_id)
            ))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(SessionError::SessionGone(session_id.to_string()));
        }

        if !response.status().is_success() {
            let msg = response.text().await.unwrap_or_default();
            return Err(SessionError::Api(msg));
        }

        let events: Vec<BridgeEvent> = response.json().await?;
        if !events.is_empty() {
            debug!("Received {} session events", events.len());
        }
        Ok(events)
    }

    /// Hand updated credentials back to the bridge for persistence.
    #[instrument(skip(self, credentials))]
    pub async fn save_credentials(
        &self,
        session_id: &str,
        credentials: Value,
    ) -> Result<(), SessionError> {
        let request = SaveCredentialsRequest { credentials };

        let response = self
            .client
            .post(format!(
                "{}/v1/sessions/{}/credentials",
                self.base_url,
                encode(session_id)
            ))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let msg = response.text().await.unwrap_or_default();
            warn!("Credential save failed: {}", msg);
            return Err(SessionError::Api(msg));
        }

        Ok(())
    }

    /// Send a text message to a transport address.
    #[instrument(skip(self, text))]
    pub async fn send_text(
        &self,
        session_id: &str,
        jid: &str,
        text: &str,
    ) -> Result<Option<String>, SessionError> {
        let request = SendTextRequest {
            jid: jid.to_string(),
            text: text.to_string(),
        };

        let response = self
            .client
            .post(format!(
                "{}/v1/sessions/{}/messages",
                self.base_url,
                encode(session_id)
            ))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let msg = response.text().await.unwrap_or_default();
            warn!("Send failed: {}", msg);
            return Err(SessionError::SendFailed(msg));
        }

        let sent: SendTextResponse = response.json().await?;
        debug!("Sent message to {}", jid);
        Ok(sent.message_id)
    }
}
