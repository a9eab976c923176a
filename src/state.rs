use std::sync::Arc;

use crate::config::Config;
use crate::db::{AnnotationStore, BlobStore, HistoryStore, Stores};
use crate::ws::{BroadcastRelay, ConnectionRegistry};

/// Shared state handed to every handler
pub struct AppState {
    pub config: Config,
    pub registry: Arc<ConnectionRegistry>,
    pub relay: BroadcastRelay,
    pub blobs: Arc<dyn BlobStore>,
    pub highlights: Arc<dyn AnnotationStore>,
    pub history: Arc<dyn HistoryStore>,
}

impl AppState {
    pub fn new(config: Config, stores: Stores) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        Self {
            config,
            relay: BroadcastRelay::new(registry.clone()),
            registry,
            blobs: stores.blobs,
            highlights: stores.highlights,
            history: stores.history,
        }
    }

    pub fn in_memory(config: Config) -> Self {
        Self::new(config, Stores::in_memory())
    }
}
