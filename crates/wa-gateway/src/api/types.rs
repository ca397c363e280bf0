//! API request and response types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
}

/// Session status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub ok: bool,
    pub connected: bool,
    pub has_qr: bool,
}

/// Pairing challenge response.
#[derive(Debug, Serialize)]
pub struct QrResponse {
    pub ok: bool,
    pub qr: Option<String>,
}

/// Request to dispatch a text message.
///
/// Fields are loosely typed: backends send phone numbers both as strings and
/// as bare JSON numbers.
#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub phone: Option<Value>,
    pub message: Option<Value>,
    /// Caller's correlation id, echoed back untouched
    pub order_id: Option<Value>,
}

impl SendRequest {
    pub fn phone_text(&self) -> String {
        value_text(self.phone.as_ref())
    }

    pub fn message_text(&self) -> String {
        value_text(self.message.as_ref())
    }

    /// The order id to echo; empty-ish values echo as null.
    pub fn order_id(&self) -> Value {
        match &self.order_id {
            None | Some(Value::Null) | Some(Value::Bool(false)) => Value::Null,
            Some(Value::String(s)) if s.is_empty() => Value::Null,
            Some(Value::Number(n)) if n.as_f64() == Some(0.0) => Value::Null,
            Some(other) => other.clone(),
        }
    }
}

/// Response after a successful dispatch.
#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub ok: bool,
    pub order_id: Value,
    pub message_id: Option<String>,
}

fn value_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}
