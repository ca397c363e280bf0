//! Session state machine.
//!
//! [`transition`] is pure: it maps the current state and one provider event
//! to the next state plus the side effects the supervisor must carry out.

use serde::Serialize;
use serde_json::Value;
use wa_session::{CloseReason, ConnectionUpdate, SessionEvent};

/// Lifecycle state of the single chat session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    AwaitingPairing,
    Connected,
}

/// Observable session state.
///
/// `pairing_challenge` is only ever `Some` while awaiting pairing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    connection: ConnectionState,
    pairing_challenge: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            connection: ConnectionState::Disconnected,
            pairing_challenge: None,
        }
    }
}

impl SessionState {
    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn pairing_challenge(&self) -> Option<&str> {
        self.pairing_challenge.as_deref()
    }

    pub fn with_connection(connection: ConnectionState) -> Self {
        Self {
            connection,
            pairing_challenge: None,
        }
    }

    pub(crate) fn awaiting_pairing(challenge: String) -> Self {
        Self {
            connection: ConnectionState::AwaitingPairing,
            pairing_challenge: Some(challenge),
        }
    }
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Hand the credentials to the provider for persistence.
    PersistCredentials(Value),
    /// Abort any pending reconnect timer.
    CancelReconnect,
    /// Arm the reconnect timer unless one is already pending.
    ScheduleReconnect,
    /// Open a fresh session right away.
    ConnectNow,
}

/// Apply one provider event to `state`.
pub fn transition(state: &SessionState, event: SessionEvent) -> (SessionState, Vec<Effect>) {
    match event {
        SessionEvent::CredentialsChanged(credentials) => {
            (state.clone(), vec![Effect::PersistCredentials(credentials)])
        }

        SessionEvent::PairingChallenge(challenge) => {
            (SessionState::awaiting_pairing(challenge), Vec::new())
        }

        SessionEvent::Connection(ConnectionUpdate::Connecting) => match state.connection {
            // Still negotiating; a challenge already on screen stays valid.
            ConnectionState::Connecting | ConnectionState::AwaitingPairing => {
                (state.clone(), Vec::new())
            }
            _ => (
                SessionState::with_connection(ConnectionState::Connecting),
                Vec::new(),
            ),
        },

        SessionEvent::Connection(ConnectionUpdate::Open) => (
            SessionState::with_connection(ConnectionState::Connected),
            vec![Effect::CancelReconnect],
        ),

        SessionEvent::Connection(ConnectionUpdate::Closed(reason)) => {
            let next = SessionState::with_connection(ConnectionState::Disconnected);
            match reason {
                CloseReason::LoggedOut => (next, vec![Effect::CancelReconnect, Effect::ConnectNow]),
                CloseReason::Dropped { .. } => (next, vec![Effect::ScheduleReconnect]),
            }
        }
    }
}
