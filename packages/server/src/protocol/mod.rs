//! Wire-format data transfer objects, organized by protocol:
//! - `websocket`: command frames and state snapshots
//! - `http`: HTTP API response bodies

pub mod http;
pub mod websocket;
