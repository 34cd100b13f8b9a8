//! Axum-facing surface: HTTP routes, WebSocket upgrade, shared state.

pub mod handler;
pub mod server;
pub mod signal;
pub mod state;

pub use server::Server;
