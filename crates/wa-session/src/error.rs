//! Session provider errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Bridge API error: {0}")]
    Api(String),

    #[error("Session no longer exists on the bridge: {0}")]
    SessionGone(String),

    #[error("Send failed: {0}")]
    SendFailed(String),
}
