//! Domain layer: identifier value objects and the transport seam.

pub mod ids;
pub mod transport;

pub use ids::{ClientId, ConnectionId, SessionId};
#[cfg(test)]
pub use transport::MockConnectionSink;
pub use transport::{ConnectionSink, TransportError};
