//! WhatsApp dispatch gateway - authenticated HTTP front for a single chat session.
//!
//! The gateway:
//! - Keeps exactly one session to the chat transport alive, re-pairing after
//!   a remote logout and reconnecting after drops
//! - Authenticates the backend with a shared bearer secret and caps how often
//!   each client may call
//! - Enforces a cooldown between sends to the same number

pub mod admission;
pub mod api;
pub mod config;
pub mod error;
pub mod phone;
pub mod session;
pub mod sweeper;
pub mod throttle;

pub use admission::AdmissionGate;
pub use config::Config;
pub use error::GatewayError;
pub use session::{ConnectionState, SessionSupervisor, SupervisorConfig};
pub use sweeper::IdleSweeper;
pub use throttle::RecipientThrottle;
