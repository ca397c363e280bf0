//! Session event receiver with polling.

use crate::client::BridgeClient;
use crate::error::SessionError;
use crate::types::*;
use std::time::Duration;
use tokio::time::sleep;
use tokio_stream::Stream;
use tracing::{debug, error, warn};

/// Delay before polling again after a failed poll.
pub const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Consecutive failed polls after which the session is reported dropped.
pub const MAX_POLL_FAILURES: u32 = 6;

/// Event receiver that polls the bridge for one session's events.
pub struct EventReceiver {
    client: BridgeClient,
    session_id: String,
    poll_interval: Duration,
    error_backoff: Duration,
}

impl EventReceiver {
    /// Create a new event receiver.
    pub fn new(client: BridgeClient, session_id: String, poll_interval: Duration) -> Self {
        Self {
            client,
            session_id,
            poll_interval,
            error_backoff: ERROR_BACKOFF,
        }
    }

    /// Override the delay between failed polls.
    pub fn with_error_backoff(mut self, backoff: Duration) -> Self {
        self.error_backoff = backoff;
        self
    }

    /// Start receiving events as an async stream.
    ///
    /// The stream ends after the first close event. A session the bridge
    /// reports gone, or [`MAX_POLL_FAILURES`] failed polls in a row, is
    /// surfaced as a dropped connection.
    pub fn stream(self) -> impl Stream<Item = SessionEvent> {
        async_stream::stream! {
            let mut failures = 0u32;
            loop {
                match self.client.poll_events(&self.session_id).await {
                    Ok(events) => {
                        failures = 0;
                        for event in events {
                            let event = SessionEvent::from(event);
                            let closed = matches!(
                                event,
                                SessionEvent::Connection(ConnectionUpdate::Closed(_))
                            );
                            debug!(session_id = %self.session_id, ?closed, "Session event");
                            yield event;
                            if closed {
                                return;
                            }
                        }
                    }
                    Err(SessionError::SessionGone(id)) => {
                        warn!(session_id = %id, "Bridge dropped the session");
                        yield SessionEvent::Connection(ConnectionUpdate::Closed(
                            CloseReason::Dropped {
                                status_code: None,
                                message: Some("session gone".into()),
                            },
                        ));
                        return;
                    }
                    Err(e) => {
                        failures += 1;
                        error!(failures, "Event poll error: {}", e);
                        if failures >= MAX_POLL_FAILURES {
                            warn!(
                                session_id = %self.session_id,
                                "Bridge unreachable, dropping session"
                            );
                            yield SessionEvent::Connection(ConnectionUpdate::Closed(
                                CloseReason::Dropped {
                                    status_code: None,
                                    message: Some(e.to_string()),
                                },
                            ));
                            return;
                        }
                        // Back off on error
                        sleep(self.error_backoff).await;
                        continue;
                    }
                }

                sleep(self.poll_interval).await;
            }
        }
    }
}
