//! Per-recipient send cooldown.

use crate::error::GatewayError;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

/// Enforces a minimum quiet period between successful sends to one number.
///
/// Checking and recording are separate steps: the caller checks, dispatches,
/// and records only once the dispatch succeeded. Two concurrent sends to the
/// same number can therefore both pass the check.
#[derive(Clone)]
pub struct RecipientThrottle {
    min_gap: Duration,
    last_sent: Arc<RwLock<HashMap<String, Instant>>>,
}

impl RecipientThrottle {
    pub fn new(min_gap: Duration) -> Self {
        Self {
            min_gap,
            last_sent: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Fail with the remaining wait if `phone` is still cooling down.
    ///
    /// Reads only; nothing is reserved until [`mark_sent`](Self::mark_sent).
    pub async fn check_and_reserve(&self, phone: &str) -> Result<(), GatewayError> {
        let last_sent = self.last_sent.read().await;
        let Some(last) = last_sent.get(phone) else {
            return Ok(());
        };

        let elapsed = last.elapsed();
        if elapsed < self.min_gap {
            let remaining = self.min_gap - elapsed;
            let wait_seconds = remaining.as_millis().div_ceil(1000) as u64;
            debug!(phone = %phone, wait_seconds, "Recipient still cooling down");
            return Err(GatewayError::RecipientCooldown { wait_seconds });
        }

        Ok(())
    }

    /// Record a successful dispatch to `phone`.
    pub async fn mark_sent(&self, phone: &str) {
        self.last_sent
            .write()
            .await
            .insert(phone.to_string(), Instant::now());
    }

    /// Forget numbers whose cooldown has fully elapsed.
    pub async fn prune_idle(&self) -> usize {
        let mut last_sent = self.last_sent.write().await;
        let before = last_sent.len();
        last_sent.retain(|_, last| last.elapsed() < self.min_gap);
        before - last_sent.len()
    }

    /// Number of recipients currently tracked.
    pub async fn tracked_recipients(&self) -> usize {
        self.last_sent.read().await.len()
    }
}
