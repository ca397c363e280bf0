//! The session provider contract and its bridge-backed implementation.

use crate::client::BridgeClient;
use crate::error::SessionError;
use crate::receiver::EventReceiver;
use crate::types::SessionEvent;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Stream of events for one provider session.
pub type EventStream = BoxStream<'static, SessionEvent>;

/// A freshly opened provider session.
pub struct ProviderSession {
    /// Handle used to persist credentials and send messages.
    pub handle: Arc<dyn SessionHandle>,
    /// Credential, pairing and connection events, in arrival order.
    pub events: EventStream,
}

/// Opens sessions against the chat transport.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Open a session whose credentials live under `credential_store`.
    async fn connect(&self, credential_store: &Path) -> Result<ProviderSession, SessionError>;
}

/// Operations on an open provider session.
#[async_trait]
pub trait SessionHandle: Send + Sync {
    /// Persist credentials reported by a `CredentialsChanged` event.
    async fn save_credentials(&self, credentials: Value) -> Result<(), SessionError>;

    /// Send `text` to a transport address, returning the message id if the
    /// transport supplied one.
    async fn send_text(&self, address: &str, text: &str) -> Result<Option<String>, SessionError>;
}

/// Provider backed by the session bridge sidecar.
#[derive(Clone)]
pub struct BridgeProvider {
    client: BridgeClient,
    poll_interval: Duration,
}

impl BridgeProvider {
    pub fn new(client: BridgeClient, poll_interval: Duration) -> Self {
        Self {
            client,
            poll_interval,
        }
    }

    pub fn client(&self) -> &BridgeClient {
        &self.client
    }
}

#[async_trait]
impl SessionProvider for BridgeProvider {
    async fn connect(&self, credential_store: &Path) -> Result<ProviderSession, SessionError> {
        let session_id = self
            .client
            .open_session(&credential_store.to_string_lossy())
            .await?;
        info!(session_id = %session_id, "Bridge session opened");

        let receiver = EventReceiver::new(self.client.clone(), session_id.clone(), self.poll_interval);
        let handle = BridgeHandle {
            client: self.client.clone(),
            session_id,
        };

        Ok(ProviderSession {
            handle: Arc::new(handle),
            events: Box::pin(receiver.stream()),
        })
    }
}

/// Handle to one bridge session.
struct BridgeHandle {
    client: BridgeClient,
    session_id: String,
}

#[async_trait]
impl SessionHandle for BridgeHandle {
    async fn save_credentials(&self, credentials: Value) -> Result<(), SessionError> {
        self.client
            .save_credentials(&self.session_id, credentials)
            .await
    }

    async fn send_text(&self, address: &str, text: &str) -> Result<Option<String>, SessionError> {
        self.client.send_text(&self.session_id, address, text).await
    }
}
