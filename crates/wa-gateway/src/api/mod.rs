//! HTTP API for the gateway.

mod handlers;
mod middleware;
mod types;

pub use handlers::*;
pub use middleware::{admission_middleware, logging_middleware, security_headers};
pub use types::*;

use crate::admission::AdmissionGate;
use crate::session::SessionSupervisor;
use crate::throttle::RecipientThrottle;
use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 256 * 1024;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// The supervised chat session
    pub supervisor: SessionSupervisor,
    /// Per-recipient cooldown
    pub throttle: RecipientThrottle,
}

impl AppState {
    /// Create new application state.
    pub fn new(supervisor: SessionSupervisor, throttle: RecipientThrottle) -> Self {
        Self {
            supervisor,
            throttle,
        }
    }
}

/// Create the API router.
///
/// Everything except `/healthz` goes through the admission gate first.
pub fn create_router(state: AppState, gate: AdmissionGate) -> Router {
    let protected = Router::new()
        .route("/", get(handlers::status))
        .route("/qr", get(handlers::qr))
        .route("/send", post(handlers::send_message))
        .route_layer(axum_middleware::from_fn_with_state(
            gate,
            admission_middleware,
        ));

    let mut router = Router::new()
        // Health check (no auth, no rate limiting)
        .route("/healthz", get(handlers::health))
        .merge(protected)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES));

    for layer in security_headers() {
        router = router.layer(layer);
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(axum_middleware::from_fn(logging_middleware)),
        )
        .with_state(state)
}
