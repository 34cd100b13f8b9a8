//! Transport implementations of the hub's [`ConnectionSink`] seam.
//!
//! [`ConnectionSink`]: crate::domain::ConnectionSink

mod websocket;

pub use websocket::WebSocketSink;
