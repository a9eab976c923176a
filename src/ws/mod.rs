//! Realtime highlight broadcast: who is viewing which document, and fan-out
//! of annotation events between them.

pub mod connection;
pub mod registry;
pub mod relay;
pub mod session;

pub use connection::{AnnotationEvent, CloseReason, Connection, ConnectionId, ConnectionState, DeliveryError};
pub use registry::{ConnectionRegistry, Registration, RegistryStats};
pub use relay::{BroadcastRelay, RelayReport};
