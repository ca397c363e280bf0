//! Caller admission: per-client sliding window and bearer authentication.

use crate::error::GatewayError;
use axum::http::{header, HeaderMap};
use secrecy::{ExposeSecret, SecretString};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Trailing window the per-client ceiling applies to.
pub const WINDOW: Duration = Duration::from_secs(60);

/// Identity used when neither a forwarded address nor a peer address is known.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Authenticates callers and caps how often each client may call.
#[derive(Clone)]
pub struct AdmissionGate {
    secret: Arc<SecretString>,
    ceiling: usize,
    windows: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
}

impl AdmissionGate {
    /// Create a gate admitting `requests_per_minute` requests per client.
    pub fn new(secret: SecretString, requests_per_minute: u32) -> Self {
        Self {
            secret: Arc::new(secret),
            ceiling: requests_per_minute as usize,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Admit one request from `client` carrying `authorization`.
    ///
    /// The window check runs before credentials are looked at, and every
    /// request that gets past it is counted whether or not it authenticates.
    pub async fn authorize(
        &self,
        client: &str,
        authorization: Option<&str>,
    ) -> Result<(), GatewayError> {
        self.admit(client).await?;

        let token = authorization
            .and_then(parse_bearer_token)
            .ok_or(GatewayError::Unauthorized)?;

        if !safe_token_equals(token, self.secret.expose_secret()) {
            warn!(client = %client, "Rejected request with wrong bearer token");
            return Err(GatewayError::Unauthorized);
        }

        Ok(())
    }

    /// Sliding-window check for `client`, recording the request if it fits.
    async fn admit(&self, client: &str) -> Result<(), GatewayError> {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        let window = windows.entry(client.to_string()).or_default();

        while let Some(oldest) = window.front() {
            if now.duration_since(*oldest) >= WINDOW {
                window.pop_front();
            } else {
                break;
            }
        }

        if window.len() >= self.ceiling {
            let wait = window
                .front()
                .map(|oldest| WINDOW.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(WINDOW);
            warn!(client = %client, count = window.len(), "Client rate limit exceeded");
            return Err(GatewayError::RateLimited {
                wait_seconds: ceil_secs(wait),
            });
        }

        window.push_back(now);
        debug!(client = %client, count = window.len(), "Request admitted to window");
        Ok(())
    }

    /// Drop windows whose every timestamp has left the trailing window.
    ///
    /// Such a window counts as empty on its next check, so removing it
    /// never changes an outcome.
    pub async fn prune_idle(&self) -> usize {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|_, window| {
            window
                .back()
                .is_some_and(|newest| now.duration_since(*newest) < WINDOW)
        });
        before - windows.len()
    }

    /// Number of client identities currently tracked.
    pub async fn tracked_clients(&self) -> usize {
        self.windows.lock().await.len()
    }
}

/// Client identity: first forwarded-for address, then the peer address.
pub fn client_identity(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match (forwarded, peer) {
        (Some(addr), _) => addr.to_string(),
        (None, Some(peer)) => peer.ip().to_string(),
        (None, None) => UNKNOWN_CLIENT.to_string(),
    }
}

/// Extract the token from an `Authorization: Bearer <token>` value.
pub fn parse_bearer_token(value: &str) -> Option<&str> {
    let mut parts = value.split(' ');
    match (parts.next(), parts.next()) {
        (Some("Bearer"), Some(token)) if !token.is_empty() => Some(token),
        _ => None,
    }
}

/// Authorization header value, if present and valid UTF-8.
pub fn authorization_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

/// Fixed-time token comparison.
///
/// Differing lengths are rejected up front, so only the length can leak.
fn safe_token_equals(given: &str, expected: &str) -> bool {
    if given.len() != expected.len() {
        return false;
    }
    given.as_bytes().ct_eq(expected.as_bytes()).into()
}

fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}
