use std::sync::Arc;
use tracing::{debug, warn};

use super::connection::{AnnotationEvent, CloseReason, ConnectionId, DeliveryError};
use super::registry::ConnectionRegistry;

/// Outcome of relaying one event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RelayReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Fans an inbound annotation event out to the other viewers of a document.
#[derive(Clone)]
pub struct BroadcastRelay {
    registry: Arc<ConnectionRegistry>,
}

impl BroadcastRelay {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Deliver `event` to every peer of `source` on `document_id`.
    ///
    /// Delivery only enqueues on each peer's outbound queue and never waits, so
    /// a stuck peer cannot hold up the others. A peer that cannot accept the
    /// event is closed and unregistered here; the failure is not reported to
    /// the source.
    pub fn on_event(
        &self,
        document_id: &str,
        source: ConnectionId,
        event: &AnnotationEvent,
    ) -> RelayReport {
        let mut report = RelayReport::default();
        for peer in self.registry.peers_of(document_id, source) {
            match peer.try_deliver(event.clone()) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    let reason = match e {
                        DeliveryError::QueueFull => CloseReason::SlowConsumer,
                        DeliveryError::Closed => CloseReason::DeliveryFailed,
                    };
                    peer.close(reason);
                    self.registry.unregister(document_id, peer.id());
                    warn!(
                        document_id,
                        connection_id = %peer.id(),
                        %reason,
                        "dropping peer after failed delivery: {}",
                        e
                    );
                }
            }
        }
        debug!(
            document_id,
            source = %source,
            delivered = report.delivered,
            failed = report.failed,
            "relayed annotation event"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::connection::Connection;
    use tokio::sync::mpsc;

    fn viewer(
        registry: &ConnectionRegistry,
        document_id: &str,
        capacity: usize,
    ) -> (Arc<Connection>, mpsc::Receiver<AnnotationEvent>) {
        let (conn, outbox) = Connection::open(document_id, capacity);
        let conn = Arc::new(conn);
        registry.register(document_id, conn.clone());
        (conn, outbox)
    }

    #[test]
    fn fan_out_reaches_every_peer_but_the_source() {
        let registry = Arc::new(ConnectionRegistry::new());
        let relay = BroadcastRelay::new(registry.clone());
        let (a, mut a_rx) = viewer(&registry, "doc1", 8);
        let (_b, mut b_rx) = viewer(&registry, "doc1", 8);
        let (_c, mut c_rx) = viewer(&registry, "doc1", 8);

        let event = AnnotationEvent::from(r#"{"type":"highlight","text":"hello"}"#);
        let report = relay.on_event("doc1", a.id(), &event);

        assert_eq!(report, RelayReport { delivered: 2, failed: 0 });
        assert_eq!(b_rx.try_recv().unwrap(), event);
        assert_eq!(c_rx.try_recv().unwrap(), event);
        assert!(a_rx.try_recv().is_err());
        assert!(b_rx.try_recv().is_err());
    }

    #[test]
    fn broken_peer_does_not_block_the_others() {
        let registry = Arc::new(ConnectionRegistry::new());
        let relay = BroadcastRelay::new(registry.clone());
        let (a, _a_rx) = viewer(&registry, "doc1", 8);
        let (b, b_rx) = viewer(&registry, "doc1", 8);
        let (_c, mut c_rx) = viewer(&registry, "doc1", 8);
        drop(b_rx);

        let first = relay.on_event("doc1", a.id(), &AnnotationEvent::from("1"));
        assert_eq!(first, RelayReport { delivered: 1, failed: 1 });
        assert!(!b.is_open());
        assert_eq!(registry.connection_count("doc1"), 2);

        let second = relay.on_event("doc1", a.id(), &AnnotationEvent::from("2"));
        assert_eq!(second, RelayReport { delivered: 1, failed: 0 });
        assert_eq!(c_rx.try_recv().unwrap().as_str(), "1");
        assert_eq!(c_rx.try_recv().unwrap().as_str(), "2");
    }

    #[test]
    fn slow_peer_is_evicted() {
        let registry = Arc::new(ConnectionRegistry::new());
        let relay = BroadcastRelay::new(registry.clone());
        let (a, _a_rx) = viewer(&registry, "doc1", 8);
        let (slow, _slow_rx) = viewer(&registry, "doc1", 1);

        relay.on_event("doc1", a.id(), &AnnotationEvent::from("1"));
        let report = relay.on_event("doc1", a.id(), &AnnotationEvent::from("2"));

        assert_eq!(report.failed, 1);
        assert!(!slow.is_open());
        assert_eq!(registry.connection_count("doc1"), 1);
    }

    #[test]
    fn disconnected_peer_is_never_targeted() {
        let registry = Arc::new(ConnectionRegistry::new());
        let relay = BroadcastRelay::new(registry.clone());
        let (a, mut a_rx) = viewer(&registry, "doc1", 8);
        let (b, _b_rx) = viewer(&registry, "doc1", 8);
        let (_c, mut c_rx) = viewer(&registry, "doc1", 8);

        a.close(CloseReason::ClientDisconnect);
        registry.unregister("doc1", a.id());

        let report = relay.on_event("doc1", b.id(), &AnnotationEvent::from("after"));
        assert_eq!(report, RelayReport { delivered: 1, failed: 0 });
        assert_eq!(c_rx.try_recv().unwrap().as_str(), "after");
        assert!(a_rx.try_recv().is_err());
    }

    #[test]
    fn other_documents_never_receive_events() {
        let registry = Arc::new(ConnectionRegistry::new());
        let relay = BroadcastRelay::new(registry.clone());
        let (a, _a_rx) = viewer(&registry, "doc1", 8);
        let (_b, mut b_rx) = viewer(&registry, "doc2", 8);

        let report = relay.on_event("doc1", a.id(), &AnnotationEvent::from("x"));
        assert_eq!(report, RelayReport::default());
        assert!(b_rx.try_recv().is_err());
    }

    #[test]
    fn events_keep_their_order_per_peer() {
        let registry = Arc::new(ConnectionRegistry::new());
        let relay = BroadcastRelay::new(registry.clone());
        let (a, _a_rx) = viewer(&registry, "doc1", 64);
        let (_b, mut b_rx) = viewer(&registry, "doc1", 64);

        for i in 0..32 {
            relay.on_event("doc1", a.id(), &AnnotationEvent::from(i.to_string()));
        }
        for i in 0..32 {
            assert_eq!(b_rx.try_recv().unwrap().as_str(), i.to_string());
        }
    }
}
