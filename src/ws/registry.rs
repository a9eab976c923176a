use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::connection::{AnnotationEvent, CloseReason, Connection, ConnectionId};

type ConnectionSet = HashMap<ConnectionId, Arc<Connection>>;

/// Live connections per document.
///
/// One lock guards the whole mapping. Every operation is O(set size) at worst
/// and never awaits while holding the lock.
#[derive(Default)]
pub struct ConnectionRegistry {
    documents: RwLock<HashMap<String, ConnectionSet>>,
}

/// Counts reported by the diagnostics endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub documents: usize,
    pub connections: usize,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `connection` to the set for `document_id`.
    ///
    /// Sets are keyed by connection id, so registering the same connection a
    /// second time is a no-op. A connection only joins the set of the document
    /// it was opened for; any other `document_id` is ignored.
    pub fn register(&self, document_id: &str, connection: Arc<Connection>) {
        if connection.document_id() != document_id {
            warn!(
                document_id,
                connection_id = %connection.id(),
                scope = connection.document_id(),
                "refusing to register connection outside its document"
            );
            return;
        }
        let mut documents = self.documents.write().unwrap_or_else(PoisonError::into_inner);
        let set = documents.entry(document_id.to_string()).or_default();
        let connection_id = connection.id();
        if set.contains_key(&connection_id) {
            debug!(document_id, %connection_id, "connection already registered");
            return;
        }
        set.insert(connection_id, connection);
        debug!(document_id, %connection_id, viewers = set.len(), "connection registered");
    }

    /// Remove `connection_id` from the set for `document_id`. Unknown ids are
    /// ignored. An emptied set is dropped.
    pub fn unregister(&self, document_id: &str, connection_id: ConnectionId) {
        let mut documents = self.documents.write().unwrap_or_else(PoisonError::into_inner);
        let Some(set) = documents.get_mut(document_id) else {
            return;
        };
        if set.remove(&connection_id).is_some() {
            debug!(document_id, %connection_id, viewers = set.len(), "connection unregistered");
        }
        if set.is_empty() {
            documents.remove(document_id);
        }
    }

    /// Snapshot of the open connections on `document_id` other than
    /// `excluding`. The returned vector is detached from the registry.
    pub fn peers_of(&self, document_id: &str, excluding: ConnectionId) -> Vec<Arc<Connection>> {
        let documents = self.documents.read().unwrap_or_else(PoisonError::into_inner);
        documents
            .get(document_id)
            .map(|set| {
                set.values()
                    .filter(|conn| conn.id() != excluding && conn.is_open())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Open a connection for `document_id` and register it. The returned
    /// guard unregisters the connection when dropped.
    pub fn open(
        self: &Arc<Self>,
        document_id: &str,
        capacity: usize,
    ) -> (Registration, mpsc::Receiver<AnnotationEvent>) {
        let (connection, outbox) = Connection::open(document_id, capacity);
        let connection = Arc::new(connection);
        self.register(document_id, connection.clone());
        let registration = Registration {
            registry: self.clone(),
            connection,
        };
        (registration, outbox)
    }

    /// Close every registered connection. Each connection's own task observes
    /// the close and unregisters itself.
    pub fn close_all(&self, reason: CloseReason) -> usize {
        let connections: Vec<Arc<Connection>> = {
            let documents = self.documents.read().unwrap_or_else(PoisonError::into_inner);
            documents.values().flat_map(|set| set.values().cloned()).collect()
        };
        let closed = connections.iter().filter(|conn| conn.close(reason)).count();
        info!(closed, %reason, "closed all realtime connections");
        closed
    }

    pub fn stats(&self) -> RegistryStats {
        let documents = self.documents.read().unwrap_or_else(PoisonError::into_inner);
        RegistryStats {
            documents: documents.len(),
            connections: documents.values().map(HashMap::len).sum(),
        }
    }

    pub fn connection_count(&self, document_id: &str) -> usize {
        let documents = self.documents.read().unwrap_or_else(PoisonError::into_inner);
        documents.get(document_id).map_or(0, HashMap::len)
    }
}

/// Registration of one connection. Dropping it closes the connection (if still
/// open) and unregisters it, whichever way the owning task exits.
pub struct Registration {
    registry: Arc<ConnectionRegistry>,
    connection: Arc<Connection>,
}

impl Registration {
    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.connection.close(CloseReason::ClientDisconnect);
        self.registry
            .unregister(self.connection.document_id(), self.connection.id());
    }
}
