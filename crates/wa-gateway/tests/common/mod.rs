//! Common test utilities for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_stream::wrappers::UnboundedReceiverStream;
use wa_gateway::{SessionSupervisor, SupervisorConfig};
use wa_session::{
    CloseReason, ConnectionUpdate, ProviderSession, SessionError, SessionEvent, SessionHandle,
    SessionProvider,
};

/// In-memory session provider driven by the test.
#[derive(Default)]
pub struct FakeProvider {
    connects: AtomicUsize,
    failures_left: AtomicUsize,
    connect_delay: Mutex<Option<Duration>>,
    sessions: Mutex<Vec<UnboundedSender<SessionEvent>>>,
    stores: Mutex<Vec<PathBuf>>,
    outbox: Arc<Outbox>,
}

/// Everything the fake handles were asked to do.
#[derive(Default)]
pub struct Outbox {
    pub sent: Mutex<Vec<(String, String)>>,
    pub credentials: Mutex<Vec<Value>>,
    pub send_failure: Mutex<Option<String>>,
}

impl FakeProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Make the next `n` connect calls fail.
    pub fn fail_connects(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    pub fn set_connect_delay(&self, delay: Duration) {
        *self.connect_delay.lock().unwrap() = Some(delay);
    }

    pub fn credential_stores(&self) -> Vec<PathBuf> {
        self.stores.lock().unwrap().clone()
    }

    /// Deliver an event on the most recently opened session.
    pub fn emit(&self, event: SessionEvent) {
        let sessions = self.sessions.lock().unwrap();
        let sender = sessions.last().expect("no session opened");
        let _ = sender.send(event);
    }

    /// Deliver an event on the `index`-th session ever opened.
    pub fn emit_to(&self, index: usize, event: SessionEvent) {
        let sessions = self.sessions.lock().unwrap();
        let _ = sessions[index].send(event);
    }

    /// End the most recent session's event stream without a close event.
    pub fn end_stream(&self) {
        self.sessions.lock().unwrap().pop();
    }

    pub fn open(&self) {
        self.emit(SessionEvent::Connection(ConnectionUpdate::Open));
    }

    pub fn drop_connection(&self) {
        self.emit(SessionEvent::Connection(ConnectionUpdate::Closed(
            CloseReason::Dropped {
                status_code: Some(428),
                message: Some("connection closed".into()),
            },
        )));
    }

    pub fn log_out(&self) {
        self.emit(SessionEvent::Connection(ConnectionUpdate::Closed(
            CloseReason::LoggedOut,
        )));
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.outbox.sent.lock().unwrap().clone()
    }

    pub fn saved_credentials(&self) -> Vec<Value> {
        self.outbox.credentials.lock().unwrap().clone()
    }

    pub fn fail_sends(&self, message: &str) {
        *self.outbox.send_failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn clear_send_failure(&self) {
        *self.outbox.send_failure.lock().unwrap() = None;
    }
}

#[async_trait]
impl SessionProvider for FakeProvider {
    async fn connect(&self, credential_store: &Path) -> Result<ProviderSession, SessionError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.stores.lock().unwrap().push(credential_store.to_path_buf());

        let delay = *self.connect_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(SessionError::Api("bridge unavailable".into()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.sessions.lock().unwrap().push(tx);

        Ok(ProviderSession {
            handle: Arc::new(FakeHandle {
                outbox: self.outbox.clone(),
            }),
            events: Box::pin(UnboundedReceiverStream::new(rx)),
        })
    }
}

struct FakeHandle {
    outbox: Arc<Outbox>,
}

#[async_trait]
impl SessionHandle for FakeHandle {
    async fn save_credentials(&self, credentials: Value) -> Result<(), SessionError> {
        self.outbox.credentials.lock().unwrap().push(credentials);
        Ok(())
    }

    async fn send_text(&self, address: &str, text: &str) -> Result<Option<String>, SessionError> {
        if let Some(message) = self.outbox.send_failure.lock().unwrap().clone() {
            return Err(SessionError::SendFailed(message));
        }
        let mut sent = self.outbox.sent.lock().unwrap();
        sent.push((address.to_string(), text.to_string()));
        Ok(Some(format!("MSG-{}", sent.len())))
    }
}

pub fn supervisor_config() -> SupervisorConfig {
    SupervisorConfig {
        credential_store: PathBuf::from("/tmp/wa-auth"),
        reconnect_delay: Duration::from_secs(3),
        retry_delay: Duration::from_secs(5),
    }
}

pub fn supervisor(provider: &Arc<FakeProvider>) -> SessionSupervisor {
    SessionSupervisor::new(provider.clone(), supervisor_config())
}

/// Let spawned tasks drain their queues.
pub async fn settle() {
    for _ in 0..5 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

/// Supervisor that has opened a session and seen it come up.
pub async fn connected_supervisor(provider: &Arc<FakeProvider>) -> SessionSupervisor {
    let supervisor = supervisor(provider);
    supervisor.connect().await.unwrap();
    provider.open();
    settle().await;
    assert!(supervisor.is_connected());
    supervisor
}
