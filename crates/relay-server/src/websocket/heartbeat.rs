//! Heartbeat liveness monitoring.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;

use super::connection::ClientConnection;

/// Outcome of the heartbeat loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// The client stayed silent past the grace window.
    TimedOut,
    /// The heartbeat was cancelled externally.
    Cancelled,
}

/// Liveness policy for a single connection.
///
/// The writer pings every `interval`. Any inbound frame refreshes the
/// connection's `last_seen`. A client silent for longer than
/// `interval + timeout` is considered dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    /// Time between server pings.
    pub interval: Duration,
    /// Extra silence tolerated after a ping.
    pub timeout: Duration,
}

impl Heartbeat {
    /// Create a policy.
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Maximum silence before the client is dropped.
    pub fn grace(&self) -> Duration {
        self.interval + self.timeout
    }

    /// Whether `connection` has been silent past the grace window.
    pub fn is_expired(&self, connection: &ClientConnection) -> bool {
        connection.last_seen_elapsed() > self.grace()
    }

    /// Check `connection` every `interval` until it expires or `cancel` fires.
    pub async fn run(
        self,
        connection: Arc<ClientConnection>,
        cancel: CancellationToken,
    ) -> HeartbeatResult {
        let mut check = time::interval(self.interval);
        check.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        // First tick completes immediately.
        let _ = check.tick().await;

        loop {
            tokio::select! {
                _ = check.tick() => {
                    if self.is_expired(&connection) {
                        return HeartbeatResult::TimedOut;
                    }
                }
                () = cancel.cancelled() => {
                    return HeartbeatResult::Cancelled;
                }
            }
        }
    }
}
