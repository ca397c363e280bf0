//! HTTP request handlers.

use super::types::{HealthResponse, QrResponse, SendRequest, SendResponse, StatusResponse};
use super::AppState;
use crate::error::GatewayError;
use crate::phone::normalize_phone_number;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use tracing::{error, info};

/// Liveness probe. Never authenticated.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

/// Session status for the operator.
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CACHE_CONTROL, "no-store")],
        Json(StatusResponse {
            ok: true,
            connected: state.supervisor.is_connected(),
            has_qr: state.supervisor.current_challenge().is_some(),
        }),
    )
}

/// Current pairing challenge, if the session is waiting to be linked.
pub async fn qr(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CACHE_CONTROL, "no-store")],
        Json(QrResponse {
            ok: true,
            qr: state.supervisor.current_challenge(),
        }),
    )
}

/// Dispatch a text message to one phone number.
pub async fn send_message(
    State(state): State<AppState>,
    payload: Result<Json<SendRequest>, JsonRejection>,
) -> Result<Json<SendResponse>, GatewayError> {
    if !state.supervisor.is_connected() {
        return Err(GatewayError::ServiceUnavailable);
    }

    let Json(request) = payload.map_err(|e| match e.status() {
        StatusCode::PAYLOAD_TOO_LARGE => GatewayError::PayloadTooLarge,
        _ => GatewayError::Validation(e.body_text()),
    })?;

    let phone = normalize_phone_number(&request.phone_text()).map_err(GatewayError::Validation)?;
    let message = request.message_text();
    let message = message.trim();
    if message.is_empty() {
        return Err(GatewayError::Validation("message is required".into()));
    }
    let order_id = request.order_id();

    state.throttle.check_and_reserve(&phone).await?;

    let message_id = state.supervisor.send(&phone, message).await.map_err(|e| {
        error!(phone = %phone, order_id = %order_id, error = %e, "Dispatch failed");
        GatewayError::from(e)
    })?;

    state.throttle.mark_sent(&phone).await;

    info!(phone = %phone, order_id = %order_id, "Message dispatched");

    Ok(Json(SendResponse {
        ok: true,
        order_id,
        message_id,
    }))
}
