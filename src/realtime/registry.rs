//! The set of currently open connections.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::connection::{Connection, ConnectionId};

/// Thread-safe set of live connections.
///
/// Every access goes through the internal lock, which is never held across
/// an `.await`. Callers that need to await per connection (the broadcast
/// hub) take a [`snapshot`](Self::snapshot) first.
///
/// # Examples
///
/// ```rust,no_run
/// use calcrelay::realtime::ConnectionRegistry;
///
/// let registry = ConnectionRegistry::new();
/// assert!(registry.is_empty());
/// registry.for_each(|conn| println!("{}", conn.id()));
/// ```
#[derive(Default)]
pub struct ConnectionRegistry {
    clients: Mutex<HashMap<ConnectionId, Arc<Connection>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `conn`. Returns `false` if a connection with the same id was already present.
    pub fn register(&self, conn: Arc<Connection>) -> bool {
        let id = conn.id();
        let mut clients = self.clients.lock();
        let inserted = clients.insert(id, conn).is_none();
        debug!(conn_id = %id, clients = clients.len(), "connection registered");
        inserted
    }

    /// Removes the connection with `id`, returning it if it was present.
    pub fn unregister(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        let mut clients = self.clients.lock();
        let removed = clients.remove(&id);
        if removed.is_some() {
            debug!(conn_id = %id, clients = clients.len(), "connection unregistered");
        }
        removed
    }

    /// Calls `f` once for every registered connection while holding the lock.
    ///
    /// `f` must not call back into the registry.
    pub fn for_each(&self, mut f: impl FnMut(&Arc<Connection>)) {
        let clients = self.clients.lock();
        for conn in clients.values() {
            f(conn);
        }
    }

    /// Returns the connections registered at this instant.
    pub fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.clients.lock().values().cloned().collect()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.clients.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.lock().is_empty()
    }
}
