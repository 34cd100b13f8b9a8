//! Request handlers, organized by protocol.

pub mod http;
pub mod websocket;
