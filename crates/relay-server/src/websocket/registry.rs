//! Active-connection registry and signal fan-out.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use super::connection::{ClientConnection, ConnectionId};

/// The set of currently open connections.
///
/// Mutations are serialized by the lock. Broadcasts copy the peer list and
/// release the lock before enqueueing, so a peer may register or leave while
/// a fan-out is in flight.
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Arc<ClientConnection>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Add a connection, replacing any entry with the same id.
    pub fn register(&self, connection: Arc<ClientConnection>) {
        let _ = self
            .connections
            .write()
            .insert(connection.id.clone(), connection);
    }

    /// Remove a connection. Returns `false` if it was not registered.
    pub fn unregister(&self, id: &ConnectionId) -> bool {
        self.connections.write().remove(id).is_some()
    }

    /// Whether `id` is currently registered.
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.read().contains_key(id)
    }

    /// Number of open connections.
    pub fn count(&self) -> usize {
        self.connections.read().len()
    }

    /// Ids of every open connection, in no particular order.
    pub fn ids(&self) -> Vec<ConnectionId> {
        self.connections.read().keys().cloned().collect()
    }

    /// Enqueue `frame` for every connection except `sender`.
    ///
    /// Never waits on socket I/O. Returns how many peers accepted the frame;
    /// peers with a full or closed queue are skipped.
    pub fn broadcast_except(&self, sender: &ConnectionId, frame: &Arc<String>) -> usize {
        let peers: Vec<Arc<ClientConnection>> = self
            .connections
            .read()
            .values()
            .filter(|c| &c.id != sender)
            .cloned()
            .collect();

        let mut delivered = 0;
        for peer in &peers {
            if peer.send(Arc::clone(frame)) {
                delivered += 1;
            } else {
                warn!(
                    conn_id = %peer.id,
                    dropped = peer.drop_count(),
                    "failed to enqueue signal for peer"
                );
            }
        }
        debug!(
            sender = %sender,
            peers = peers.len(),
            recipients = delivered,
            "relayed signal"
        );
        delivered
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
