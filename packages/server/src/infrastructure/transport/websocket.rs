//! [`ConnectionSink`] implementation over an axum WebSocket.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{sink::SinkExt, stream::SplitSink};

use crate::domain::{ConnectionSink, TransportError};

/// Write half of an axum WebSocket, adapted to the hub's sink seam. The
/// owning [`CoalescingSlot`] guarantees single-writer access.
///
/// [`CoalescingSlot`]: crate::hub::CoalescingSlot
pub struct WebSocketSink {
    sink: SplitSink<WebSocket, Message>,
}

impl WebSocketSink {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl ConnectionSink for WebSocketSink {
    async fn send_text(&mut self, frame: String) -> Result<(), TransportError> {
        self.sink
            .send(Message::Text(frame.into()))
            .await
            .map_err(|e| TransportError(e.to_string()))
    }

    async fn send_ping(&mut self) -> Result<(), TransportError> {
        self.sink
            .send(Message::Ping(Vec::new().into()))
            .await
            .map_err(|e| TransportError(e.to_string()))
    }
}
