//! Lifecycle supervision of the single chat session.

mod state;
mod supervisor;

pub use state::{transition, ConnectionState, Effect, SessionState};
pub use supervisor::{SessionSupervisor, SupervisorConfig, SupervisorError};
