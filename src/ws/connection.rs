use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

/// Identity of one realtime connection, minted when the channel opens.
pub type ConnectionId = Uuid;

/// Opaque highlight payload relayed verbatim between viewers of a document.
///
/// The frame text is shared behind an `Arc` so fan-out to many peers clones a
/// pointer, not the payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnnotationEvent(Arc<str>);

impl AnnotationEvent {
    pub fn new(payload: impl Into<Arc<str>>) -> Self {
        Self(payload.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for AnnotationEvent {
    fn from(payload: String) -> Self {
        Self::new(payload)
    }
}

impl From<&str> for AnnotationEvent {
    fn from(payload: &str) -> Self {
        Self::new(payload)
    }
}

/// Why a connection left the `Open` state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseReason {
    ClientDisconnect,
    TransportError,
    DeliveryFailed,
    SlowConsumer,
    HeartbeatTimeout,
    ServerShutdown,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::ClientDisconnect => "client_disconnect",
            CloseReason::TransportError => "transport_error",
            CloseReason::DeliveryFailed => "delivery_failed",
            CloseReason::SlowConsumer => "slow_consumer",
            CloseReason::HeartbeatTimeout => "heartbeat_timeout",
            CloseReason::ServerShutdown => "server_shutdown",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Liveness of a connection. `Closed` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    Closed(CloseReason),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("peer outbound queue is full")]
    QueueFull,
    #[error("peer connection is closed")]
    Closed,
}

/// One open realtime channel, scoped to a single document for its lifetime.
///
/// The connection does not own the socket. It owns the sending half of the
/// outbound queue that the socket's writer task drains, and the liveness state
/// every task servicing the socket watches.
pub struct Connection {
    id: ConnectionId,
    document_id: String,
    outbound: mpsc::Sender<AnnotationEvent>,
    state: watch::Sender<ConnectionState>,
}

impl Connection {
    /// Create an `Open` connection for `document_id` with an outbound queue of
    /// `capacity` events. The receiver is handed to the writer task.
    pub fn open(
        document_id: impl Into<String>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<AnnotationEvent>) {
        let (outbound, outbox) = mpsc::channel(capacity.max(1));
        let (state, _) = watch::channel(ConnectionState::Open);
        let connection = Self {
            id: Uuid::new_v4(),
            document_id: document_id.into(),
            outbound,
            state,
        };
        (connection, outbox)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Transition `Open -> Closed(reason)`. Returns `true` only for the call
    /// that performed the transition; later calls keep the first reason.
    pub fn close(&self, reason: CloseReason) -> bool {
        self.state.send_if_modified(|state| match state {
            ConnectionState::Open => {
                *state = ConnectionState::Closed(reason);
                true
            }
            ConnectionState::Closed(_) => false,
        })
    }

    /// Resolve once the connection is closed, yielding the close reason.
    pub async fn closed(&self) -> CloseReason {
        let mut state = self.state.subscribe();
        loop {
            let current = *state.borrow_and_update();
            if let ConnectionState::Closed(reason) = current {
                return reason;
            }
            if state.changed().await.is_err() {
                // Sender lives in `self`; unreachable while we are borrowed.
                return CloseReason::ServerShutdown;
            }
        }
    }

    /// Queue `event` for this connection without waiting.
    pub fn try_deliver(&self, event: AnnotationEvent) -> Result<(), DeliveryError> {
        if !self.is_open() {
            return Err(DeliveryError::Closed);
        }
        self.outbound.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("document_id", &self.document_id)
            .field("state", &self.state())
            .finish()
    }
}
