//! Real-time synchronization backend for the Enza planning poker tool.
//!
//! The heart of this crate is the session broadcast hub: per-room shared
//! state behind a single lock, one lightweight read-loop task per
//! connection, and a latest-wins coalescing slot in front of every
//! transport writer so a slow peer never stalls a producer.

// layers
pub mod domain;
pub mod hub;
pub mod infrastructure;
pub mod protocol;
pub mod ui;
