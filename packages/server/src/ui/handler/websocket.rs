//! WebSocket join handler and per-connection read loop.

use std::sync::Arc;

use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::stream::StreamExt;

use enza_shared::time::get_jst_timestamp;

use crate::{
    domain::{ClientId, ConnectionId, SessionId},
    hub::{CoalescingSlot, Session},
    infrastructure::transport::WebSocketSink,
    protocol::websocket::InboundFrame,
    ui::state::AppState,
};

/// `GET /api/sessions/{session_id}/join/{client_id}`
///
/// The client id comes from the joining browser and stays stable across
/// reconnects; the server only validates its shape here.
pub async fn join_session_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path((session_id, client_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, StatusCode> {
    let Ok(session_id) = session_id.parse::<SessionId>() else {
        tracing::warn!("Unable to parse session id: '{}'", session_id);
        return Err(StatusCode::BAD_REQUEST);
    };
    let Ok(client_id) = client_id.parse::<ClientId>() else {
        tracing::warn!("Unable to parse client id: '{}'", client_id);
        return Err(StatusCode::BAD_REQUEST);
    };

    let Some(session) = state.registry.get_session(session_id).await else {
        tracing::warn!("Join request for unknown session {}", session_id);
        return Err(StatusCode::NOT_FOUND);
    };

    tracing::info!("Client '{}' joining session {}", client_id, session_id);
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, session, client_id)))
}

/// Drive one connection: attach it to the session, then pump inbound frames
/// into commands until the transport closes, a frame fails to decode, or a
/// write on the outbound slot fails.
async fn handle_socket(socket: WebSocket, session: Arc<Session>, client_id: ClientId) {
    let (sender, mut receiver) = socket.split();

    let connection_id = ConnectionId::generate();
    let slot = Arc::new(CoalescingSlot::new(Box::new(WebSocketSink::new(sender))));
    let connected_at = get_jst_timestamp();

    session.join(client_id, connection_id, slot.clone()).await;

    loop {
        tokio::select! {
            msg = receiver.next() => {
                let msg = match msg {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error on connection {}: {}", connection_id, e);
                        break;
                    }
                    None => {
                        tracing::info!("Connection {} closed by transport", connection_id);
                        break;
                    }
                };

                match msg {
                    Message::Text(text) => {
                        let frame = match serde_json::from_str::<InboundFrame>(&text) {
                            Ok(frame) => frame,
                            Err(e) => {
                                tracing::warn!(
                                    "Undecodable frame from client '{}', dropping connection: {}",
                                    client_id,
                                    e
                                );
                                break;
                            }
                        };
                        match frame.into_command() {
                            Some(command) => session.handle_command(client_id, command).await,
                            None => tracing::debug!(
                                "Ignoring unrecognized command type from client '{}'",
                                client_id
                            ),
                        }
                    }
                    Message::Pong(_) => {
                        tracing::debug!("Received pong on connection {}", connection_id);
                    }
                    Message::Close(_) => {
                        tracing::info!("Client '{}' requested close", client_id);
                        break;
                    }
                    _ => {}
                }
            }
            _ = slot.closed() => {
                tracing::info!("Connection {} failed mid-write, closing", connection_id);
                break;
            }
        }
    }

    session.leave(client_id, connection_id).await;
    tracing::info!(
        "Client '{}' connection {} closed after {} ms",
        client_id,
        connection_id,
        get_jst_timestamp() - connected_at
    );
}
