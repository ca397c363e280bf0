//! Supervisor owning the single chat session.

use super::state::{transition, ConnectionState, Effect, SessionState};
use crate::phone::transport_address;
use futures::future::BoxFuture;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use wa_session::{
    CloseReason, ConnectionUpdate, EventStream, SessionError, SessionEvent, SessionHandle,
    SessionProvider,
};

/// Supervisor errors.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("chat session not connected")]
    NotConnected,

    #[error("failed to open session: {0}")]
    Connect(SessionError),

    #[error("{0}")]
    Dispatch(SessionError),
}

/// Supervisor settings.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Opaque path handed to the provider for its credentials.
    pub credential_store: PathBuf,
    /// Delay before reconnecting after a transient drop.
    pub reconnect_delay: Duration,
    /// Delay before retrying after a failed connect.
    pub retry_delay: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            credential_store: PathBuf::from("./auth"),
            reconnect_delay: Duration::from_secs(3),
            retry_delay: Duration::from_secs(5),
        }
    }
}

/// Owns the one session to the chat transport and keeps it alive.
///
/// Cloning is cheap; all clones drive the same session.
#[derive(Clone)]
pub struct SessionSupervisor {
    inner: Arc<Inner>,
}

struct Inner {
    provider: Arc<dyn SessionProvider>,
    config: SupervisorConfig,
    /// Set while a connect attempt is running.
    connecting: AtomicBool,
    shared: Mutex<Shared>,
}

#[derive(Default)]
struct Shared {
    state: SessionState,
    handle: Option<Arc<dyn SessionHandle>>,
    /// Bumped on every connect; events from older sessions are discarded.
    generation: u64,
    reconnect: Option<JoinHandle<()>>,
}

impl Shared {
    fn set_state(&mut self, next: SessionState) {
        if self.state.connection() != next.connection() {
            info!(
                from = ?self.state.connection(),
                to = ?next.connection(),
                "Session state changed"
            );
        }
        if next.connection() == ConnectionState::Disconnected {
            self.handle = None;
        }
        self.state = next;
    }

    fn reconnect_pending(&self) -> bool {
        self.reconnect
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

/// Clears the in-flight flag on every exit path.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SessionSupervisor {
    pub fn new(provider: Arc<dyn SessionProvider>, config: SupervisorConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider,
                config,
                connecting: AtomicBool::new(false),
                shared: Mutex::new(Shared::default()),
            }),
        }
    }

    /// Current lifecycle state.
    pub fn current_state(&self) -> ConnectionState {
        self.lock().state.connection()
    }

    /// Pairing challenge waiting to be scanned, if any.
    pub fn current_challenge(&self) -> Option<String> {
        self.lock().state.pairing_challenge().map(str::to_owned)
    }

    pub fn is_connected(&self) -> bool {
        self.current_state() == ConnectionState::Connected
    }

    /// Whether a reconnect timer is armed.
    pub fn reconnect_pending(&self) -> bool {
        self.lock().reconnect_pending()
    }

    /// Boot entry point: connect once, falling back to the retry schedule.
    pub async fn start(&self) {
        if let Err(e) = self.connect().await {
            error!(error = %e, "Initial session connect failed");
            self.schedule_reconnect(self.inner.config.retry_delay);
        }
    }

    /// Open a session unless one is active or an attempt is already running.
    pub fn connect(&self) -> BoxFuture<'static, Result<(), SupervisorError>> {
        let supervisor = self.clone();
        Box::pin(async move { supervisor.open_session().await })
    }

    async fn open_session(&self) -> Result<(), SupervisorError> {
        if self.inner.connecting.swap(true, Ordering::AcqRel) {
            debug!("Connect already in flight");
            return Ok(());
        }
        let _in_flight = InFlight(&self.inner.connecting);

        let generation = {
            let mut shared = self.lock();
            if shared.state.connection() != ConnectionState::Disconnected {
                debug!(state = ?shared.state.connection(), "Session active, connect skipped");
                return Ok(());
            }
            shared.generation += 1;
            shared.set_state(SessionState::with_connection(ConnectionState::Connecting));
            shared.generation
        };

        info!(generation, "Connecting chat session");
        let session = match self
            .inner
            .provider
            .connect(&self.inner.config.credential_store)
            .await
        {
            Ok(session) => session,
            Err(e) => {
                let mut shared = self.lock();
                if shared.generation == generation {
                    shared.set_state(SessionState::default());
                }
                return Err(SupervisorError::Connect(e));
            }
        };

        self.lock().handle = Some(session.handle.clone());
        tokio::spawn(
            self.clone()
                .pump(generation, session.handle, session.events),
        );
        Ok(())
    }

    /// Feed one session's events through the state machine until it closes
    /// or is superseded.
    async fn pump(self, generation: u64, handle: Arc<dyn SessionHandle>, mut events: EventStream) {
        while let Some(event) = events.next().await {
            let closed = matches!(event, SessionEvent::Connection(ConnectionUpdate::Closed(_)));
            if !self.handle_event(generation, &handle, event).await {
                debug!(generation, "Ignoring events from superseded session");
                return;
            }
            if closed {
                return;
            }
        }

        let still_open = {
            let shared = self.lock();
            shared.generation == generation
                && shared.state.connection() != ConnectionState::Disconnected
        };
        if still_open {
            warn!(generation, "Session event stream ended without a close");
            let dropped = CloseReason::Dropped {
                status_code: None,
                message: Some("event stream ended".into()),
            };
            self.handle_event(
                generation,
                &handle,
                SessionEvent::Connection(ConnectionUpdate::Closed(dropped)),
            )
            .await;
        }
    }

    /// Apply one event; returns false if the event belongs to an old session.
    async fn handle_event(
        &self,
        generation: u64,
        handle: &Arc<dyn SessionHandle>,
        event: SessionEvent,
    ) -> bool {
        let effects = {
            let mut shared = self.lock();
            if shared.generation != generation {
                return false;
            }
            let (next, effects) = transition(&shared.state, event);
            if next.pairing_challenge().is_some()
                && next.pairing_challenge() != shared.state.pairing_challenge()
            {
                info!("Pairing challenge issued");
            }
            shared.set_state(next);
            effects
        };

        for effect in effects {
            match effect {
                Effect::PersistCredentials(credentials) => {
                    if let Err(e) = handle.save_credentials(credentials).await {
                        warn!(error = %e, "Failed to persist session credentials");
                    }
                }
                Effect::CancelReconnect => self.cancel_reconnect(),
                Effect::ScheduleReconnect => {
                    warn!("Session connection dropped");
                    self.schedule_reconnect(self.inner.config.reconnect_delay);
                }
                Effect::ConnectNow => {
                    warn!("Session logged out, starting a fresh pairing");
                    if let Err(e) = self.connect().await {
                        error!(error = %e, "Failed to recreate session");
                        self.schedule_reconnect(self.inner.config.retry_delay);
                    }
                }
            }
        }

        true
    }

    /// Arm the reconnect timer for `delay` unless one is already pending.
    ///
    /// A reconnect that fails re-arms the timer with the retry delay.
    pub fn schedule_reconnect(&self, delay: Duration) {
        let mut shared = self.lock();
        if shared.reconnect_pending() {
            debug!("Reconnect already scheduled");
            return;
        }

        info!(delay_ms = delay.as_millis() as u64, "Scheduling session reconnect");
        let supervisor = self.clone();
        shared.reconnect = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            supervisor.lock().reconnect = None;

            if let Err(e) = supervisor.connect().await {
                error!(error = %e, "Reconnect attempt failed");
                supervisor.schedule_reconnect(supervisor.inner.config.retry_delay);
            }
        }));
    }

    /// Abort the pending reconnect timer, if any.
    pub fn cancel_reconnect(&self) {
        let pending = self.lock().reconnect.take();
        if let Some(task) = pending {
            task.abort();
            debug!("Pending reconnect cancelled");
        }
    }

    /// Stop background work ahead of process exit.
    pub fn shutdown(&self) {
        self.cancel_reconnect();
    }

    /// Send `text` to a normalized phone number over the live session.
    ///
    /// Returns the transport's message id when it supplies one. Failures are
    /// not retried here.
    pub async fn send(&self, phone: &str, text: &str) -> Result<Option<String>, SupervisorError> {
        let handle = {
            let shared = self.lock();
            match (&shared.handle, shared.state.connection()) {
                (Some(handle), ConnectionState::Connected) => handle.clone(),
                _ => return Err(SupervisorError::NotConnected),
            }
        };

        let address = transport_address(phone);
        handle
            .send_text(&address, text)
            .await
            .map_err(SupervisorError::Dispatch)
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.inner
            .shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
