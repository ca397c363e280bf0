//! Session events and bridge wire types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Suffix the transport uses for direct (non-group) chats.
pub const DIRECT_CHAT_SUFFIX: &str = "@s.whatsapp.net";

/// Close status code the transport reports when the account was logged out
/// remotely and the stored credentials are no longer valid.
pub const LOGGED_OUT_STATUS: u16 = 401;

/// Event emitted by a provider session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Credentials changed and must be persisted through the handle.
    CredentialsChanged(Value),
    /// A new pairing challenge is waiting to be scanned by the operator.
    PairingChallenge(String),
    /// The transport connection changed state.
    Connection(ConnectionUpdate),
}

/// Transport connection state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionUpdate {
    /// The transport is still negotiating.
    Connecting,
    /// The session is linked and usable.
    Open,
    /// The transport connection closed.
    Closed(CloseReason),
}

/// Why a transport connection closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The remote side invalidated the session; a fresh pairing is required.
    LoggedOut,
    /// Anything else: network drop, restart request, stream error.
    Dropped {
        status_code: Option<u16>,
        message: Option<String>,
    },
}

impl CloseReason {
    /// Classify a close by the status code the bridge reported.
    pub fn from_status(status_code: Option<u16>, message: Option<String>) -> Self {
        match status_code {
            Some(LOGGED_OUT_STATUS) => CloseReason::LoggedOut,
            _ => CloseReason::Dropped {
                status_code,
                message,
            },
        }
    }

    pub fn is_logout(&self) -> bool {
        matches!(self, CloseReason::LoggedOut)
    }
}

/// Event as serialized by the bridge.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BridgeEvent {
    Qr {
        qr: String,
    },
    Creds {
        credentials: Value,
    },
    Connection {
        connection: BridgeConnection,
        #[serde(default)]
        status_code: Option<u16>,
        #[serde(default)]
        error: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BridgeConnection {
    Connecting,
    Open,
    Close,
}

impl From<BridgeEvent> for SessionEvent {
    fn from(event: BridgeEvent) -> Self {
        match event {
            BridgeEvent::Qr { qr } => SessionEvent::PairingChallenge(qr),
            BridgeEvent::Creds { credentials } => SessionEvent::CredentialsChanged(credentials),
            BridgeEvent::Connection {
                connection,
                status_code,
                error,
            } => SessionEvent::Connection(match connection {
                BridgeConnection::Connecting => ConnectionUpdate::Connecting,
                BridgeConnection::Open => ConnectionUpdate::Open,
                BridgeConnection::Close => {
                    ConnectionUpdate::Closed(CloseReason::from_status(status_code, error))
                }
            }),
        }
    }
}

/// Request to open a session on the bridge.
#[derive(Debug, Clone, Serialize)]
pub struct OpenSessionRequest {
    pub auth_dir: String,
}

/// Bridge reply to an open request.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenSessionResponse {
    pub session_id: String,
}

/// Credential persistence request.
#[derive(Debug, Clone, Serialize)]
pub struct SaveCredentialsRequest {
    pub credentials: Value,
}

/// Outgoing text message.
#[derive(Debug, Clone, Serialize)]
pub struct SendTextRequest {
    pub jid: String,
    pub text: String,
}

/// Send message response.
#[derive(Debug, Clone, Deserialize)]
pub struct SendTextResponse {
    #[serde(default)]
    pub message_id: Option<String>,
}

/// Transport address for a direct chat with a digits-only phone number.
pub fn direct_chat_address(phone_digits: &str) -> String {
    format!("{}{}", phone_digits, DIRECT_CHAT_SUFFIX)
}
