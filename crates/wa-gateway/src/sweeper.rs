//! Periodic eviction of idle limiter entries.
//!
//! Both limiters keep one entry per key ever seen. An entry whose timestamps
//! have all aged out behaves exactly like a missing one, so dropping it keeps
//! memory bounded by recent traffic without changing any decision.

use crate::admission::AdmissionGate;
use crate::throttle::RecipientThrottle;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Sweeps idle caller windows and expired recipient cooldowns.
pub struct IdleSweeper {
    gate: AdmissionGate,
    throttle: RecipientThrottle,
    interval: Duration,
}

impl IdleSweeper {
    pub fn new(gate: AdmissionGate, throttle: RecipientThrottle, interval: Duration) -> Self {
        Self {
            gate,
            throttle,
            interval,
        }
    }

    /// Run a single sweep, returning how many entries were removed.
    pub async fn sweep_once(&self) -> usize {
        let callers = self.gate.prune_idle().await;
        let recipients = self.throttle.prune_idle().await;

        if callers + recipients > 0 {
            debug!(callers, recipients, "Swept idle limiter entries");
        }
        callers + recipients
    }

    /// Sweep forever on the configured interval.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                self.sweep_once().await;
            }
        })
    }
}
