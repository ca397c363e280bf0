//! Error types for the gateway.

use crate::session::SupervisorError;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Gateway error types.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0}")]
    Validation(String),

    #[error("request body too large")]
    PayloadTooLarge,

    #[error("unauthorized")]
    Unauthorized,

    #[error("rate limited: wait {wait_seconds}s before retrying")]
    RateLimited { wait_seconds: u64 },

    #[error("recipient cooldown: wait {wait_seconds}s before sending to this number again")]
    RecipientCooldown { wait_seconds: u64 },

    #[error("chat session not connected")]
    ServiceUnavailable,

    #[error("dispatch failed: {0}")]
    Dispatch(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_seconds: Option<u64>,
}

impl GatewayError {
    /// Seconds the caller should wait before retrying, if any.
    pub fn wait_seconds(&self) -> Option<u64> {
        match self {
            GatewayError::RateLimited { wait_seconds }
            | GatewayError::RecipientCooldown { wait_seconds } => Some(*wait_seconds),
            _ => None,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            GatewayError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            GatewayError::PayloadTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE"),
            GatewayError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            GatewayError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
            GatewayError::RecipientCooldown { .. } => {
                (StatusCode::TOO_MANY_REQUESTS, "RECIPIENT_COOLDOWN")
            }
            GatewayError::ServiceUnavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE")
            }
            GatewayError::Dispatch(_) => (StatusCode::BAD_REQUEST, "DISPATCH_FAILED"),
        };

        let wait_seconds = self.wait_seconds();
        let body = ErrorResponse {
            ok: false,
            error: self.to_string(),
            code: code.to_string(),
            wait_seconds,
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(wait) = wait_seconds {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(wait));
        }
        response
    }
}

impl From<SupervisorError> for GatewayError {
    fn from(e: SupervisorError) -> Self {
        match e {
            SupervisorError::NotConnected | SupervisorError::Connect(_) => {
                GatewayError::ServiceUnavailable
            }
            SupervisorError::Dispatch(e) => GatewayError::Dispatch(e.to_string()),
        }
    }
}
