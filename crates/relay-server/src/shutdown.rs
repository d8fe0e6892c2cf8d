//! Shutdown coordination for the HTTP listener and live relay sessions.
//!
//! Upgraded WebSocket sessions outlive the HTTP request that created them, so
//! axum's graceful shutdown does not wait for them. Each session task is
//! tracked here instead and drained after the token fires, giving every
//! client a close frame before the runtime goes away.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How long sessions and the listener get to finish once shutdown starts.
const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Owns the shutdown token and the set of running session tasks.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    sessions: Mutex<Vec<JoinHandle<()>>>,
}

impl ShutdownCoordinator {
    /// Create a coordinator with no tracked sessions.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            sessions: Mutex::new(Vec::new()),
        }
    }

    /// Token observed by the listener and every session.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Track a spawned session so shutdown can wait for it.
    ///
    /// Finished sessions are pruned on each call.
    pub fn track_session(&self, handle: JoinHandle<()>) {
        let mut sessions = self.sessions.lock();
        sessions.retain(|h| !h.is_finished());
        sessions.push(handle);
    }

    /// Number of tracked sessions still running.
    pub fn active_sessions(&self) -> usize {
        self.sessions
            .lock()
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }

    /// Fire the token without waiting.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Fire the token, then wait for every session and the listener task.
    ///
    /// Sessions drain first so their close frames are written while the
    /// runtime is still up. Anything still running after `timeout` is
    /// aborted. Returns `true` when everything finished in time.
    pub async fn graceful_shutdown(
        &self,
        listener: JoinHandle<()>,
        timeout: Option<Duration>,
    ) -> bool {
        let timeout = timeout.unwrap_or(DEFAULT_DRAIN_TIMEOUT);
        self.shutdown();

        let sessions: Vec<JoinHandle<()>> = std::mem::take(&mut *self.sessions.lock());
        info!(
            sessions = sessions.len(),
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            "draining sessions"
        );

        let aborts: Vec<_> = sessions
            .iter()
            .map(JoinHandle::abort_handle)
            .chain(std::iter::once(listener.abort_handle()))
            .collect();

        let drain = async move {
            let _ = futures::future::join_all(sessions).await;
            let _ = listener.await;
        };

        if tokio::time::timeout(timeout, drain).await.is_ok() {
            true
        } else {
            warn!("shutdown timed out after {timeout:?}, aborting remaining tasks");
            for handle in aborts {
                handle.abort();
            }
            false
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
