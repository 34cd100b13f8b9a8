//! Transport seam between the hub core and the WebSocket layer.
//!
//! The hub never touches a socket directly; it pushes serialized frames
//! through this trait. The concrete implementation lives in the
//! infrastructure layer, test doubles live next to the hub's tests.

use async_trait::async_trait;
use thiserror::Error;

/// A failed write on a connection. The owning connection is torn down and
/// treated as an implicit leave; writes are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transport write failed: {0}")]
pub struct TransportError(pub String);

/// Write half of one live connection.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConnectionSink: Send {
    /// Write one text frame to the peer.
    async fn send_text(&mut self, frame: String) -> Result<(), TransportError>;

    /// Write one ping frame to the peer.
    async fn send_ping(&mut self) -> Result<(), TransportError>;
}
