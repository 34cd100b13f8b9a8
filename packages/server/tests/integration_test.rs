//! Integration tests driving the voting server over real HTTP and
//! WebSocket connections.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use uuid::Uuid;

use enza_server::hub::SessionRegistry;
use enza_server::protocol::http::CreateSessionResponse;
use enza_server::protocol::websocket::RoomSnapshot;
use enza_server::ui::Server;

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

/// Serve the full router on an ephemeral port.
async fn spawn_server() -> SocketAddr {
    let registry = SessionRegistry::new();
    let app = Server::new(registry).router();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test listener");
    let addr = listener.local_addr().expect("listener has no local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server crashed");
    });
    addr
}

async fn create_session(addr: SocketAddr) -> String {
    let res = reqwest::Client::new()
        .post(format!("http://{addr}/api/sessions/create"))
        .send()
        .await
        .expect("create request failed");
    assert_eq!(res.status(), 200);
    res.json::<CreateSessionResponse>()
        .await
        .expect("create response should be JSON")
        .uuid
}

async fn join(addr: SocketAddr, session_id: &str, client_id: &str) -> WsClient {
    let url = format!("ws://{addr}/api/sessions/{session_id}/join/{client_id}");
    let (ws, _) = connect_async(&url).await.expect("join handshake failed");
    ws
}

async fn send(ws: &mut WsClient, json: &str) {
    ws.send(Message::Text(json.to_string().into()))
        .await
        .expect("failed to send frame");
}

async fn next_text(ws: &mut WsClient) -> String {
    loop {
        let msg = timeout(WAIT, ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("connection closed while waiting for a frame")
            .expect("websocket error while waiting for a frame");
        if let Message::Text(text) = msg {
            return text.as_str().to_string();
        }
    }
}

/// Read frames until one parses as a snapshot matching `predicate`.
async fn wait_for_snapshot<F>(ws: &mut WsClient, mut predicate: F) -> RoomSnapshot
where
    F: FnMut(&RoomSnapshot) -> bool,
{
    loop {
        let text = next_text(ws).await;
        if let Ok(snapshot) = serde_json::from_str::<RoomSnapshot>(&text) {
            if predicate(&snapshot) {
                return snapshot;
            }
        }
    }
}

/// Read the next text frame and require it to be a snapshot.
async fn next_snapshot(ws: &mut WsClient) -> RoomSnapshot {
    let text = next_text(ws).await;
    serde_json::from_str(&text).expect("expected a snapshot frame")
}

/// The first text frame for a brand-new client id must be the Init greeting.
async fn expect_init(ws: &mut WsClient) {
    let text = next_text(ws).await;
    assert_eq!(text, r#"{"type":"Init"}"#);
}

fn vote_of<'a>(snapshot: &'a RoomSnapshot, username: &str) -> &'a i32 {
    &snapshot
        .client_data
        .iter()
        .find(|entry| entry.username == username)
        .unwrap_or_else(|| panic!("no roster entry for '{username}'"))
        .vote
}

#[tokio::test]
async fn test_create_session_and_status_check() {
    let addr = spawn_server().await;

    let session_id = create_session(addr).await;

    let client = reqwest::Client::new();
    let ok = client
        .get(format!("http://{addr}/api/sessions/{session_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(ok.status(), 200);

    let unknown = client
        .get(format!("http://{addr}/api/sessions/{}", Uuid::new_v4()))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), 404);

    let malformed = client
        .get(format!("http://{addr}/api/sessions/not-a-uuid"))
        .send()
        .await
        .unwrap();
    assert_eq!(malformed.status(), 400);
}

#[tokio::test]
async fn test_join_unknown_session_is_rejected() {
    let addr = spawn_server().await;

    let url = format!(
        "ws://{addr}/api/sessions/{}/join/{}",
        Uuid::new_v4(),
        Uuid::new_v4()
    );
    assert!(connect_async(&url).await.is_err());
}

#[tokio::test]
async fn test_vote_and_reveal_flow() {
    let addr = spawn_server().await;
    let session_id = create_session(addr).await;

    // Alice joins; a brand-new client id is greeted before any snapshot.
    let mut alice = join(addr, &session_id, &Uuid::new_v4().to_string()).await;
    expect_init(&mut alice).await;
    let first = next_snapshot(&mut alice).await;
    assert!(!first.votes_visible);
    assert_eq!(first.client_data.len(), 1);

    send(
        &mut alice,
        r#"{"type":"UpdateData","username":"Alice","vote":"5"}"#,
    )
    .await;
    let snapshot = wait_for_snapshot(&mut alice, |s| {
        s.client_data.iter().any(|c| c.username == "Alice")
    })
    .await;
    assert_eq!(*vote_of(&snapshot, "Alice"), 5);
    assert!(!snapshot.votes_visible);

    // Bob joins; both connections see a two-entry roster.
    let mut bob = join(addr, &session_id, &Uuid::new_v4().to_string()).await;
    expect_init(&mut bob).await;
    wait_for_snapshot(&mut bob, |s| s.client_data.len() == 2).await;
    wait_for_snapshot(&mut alice, |s| s.client_data.len() == 2).await;

    send(
        &mut bob,
        r#"{"type":"UpdateData","username":"Bob","vote":"8"}"#,
    )
    .await;
    wait_for_snapshot(&mut bob, |s| {
        s.client_data.iter().any(|c| c.username == "Bob" && c.vote == 8)
    })
    .await;
    wait_for_snapshot(&mut alice, |s| {
        s.client_data.iter().any(|c| c.username == "Bob" && c.vote == 8)
    })
    .await;

    // Reveal: both participants see the votes, unchanged.
    send(&mut alice, r#"{"type":"ShowVotes"}"#).await;
    let revealed = wait_for_snapshot(&mut alice, |s| s.votes_visible).await;
    assert_eq!(*vote_of(&revealed, "Alice"), 5);
    assert_eq!(*vote_of(&revealed, "Bob"), 8);
    wait_for_snapshot(&mut bob, |s| s.votes_visible).await;

    // A ClearVotes inside the cooldown window is silently ignored; the probe
    // UpdateData right after it broadcasts the untouched state.
    send(&mut alice, r#"{"type":"ClearVotes"}"#).await;
    send(&mut alice, r#"{"type":"UpdateData"}"#).await;
    let probed = next_snapshot(&mut alice).await;
    assert!(probed.votes_visible);
    assert_eq!(*vote_of(&probed, "Alice"), 5);
    assert_eq!(*vote_of(&probed, "Bob"), 8);

    // After the cooldown elapses the toggle goes through.
    tokio::time::sleep(Duration::from_millis(1200)).await;
    send(&mut alice, r#"{"type":"ClearVotes"}"#).await;
    let cleared = wait_for_snapshot(&mut alice, |s| !s.votes_visible).await;
    assert!(cleared.client_data.iter().all(|c| c.vote == -1));
    wait_for_snapshot(&mut bob, |s| !s.votes_visible).await;
}

#[tokio::test]
async fn test_two_tabs_share_one_roster_entry() {
    let addr = spawn_server().await;
    let session_id = create_session(addr).await;
    let client_id = Uuid::new_v4().to_string();

    let mut tab1 = join(addr, &session_id, &client_id).await;
    expect_init(&mut tab1).await;
    next_snapshot(&mut tab1).await;

    send(
        &mut tab1,
        r#"{"type":"UpdateData","username":"Alice","vote":"5"}"#,
    )
    .await;
    wait_for_snapshot(&mut tab1, |s| s.client_data.iter().any(|c| c.vote == 5)).await;

    // The second tab is not greeted again and only gets the current state;
    // the roster still has a single entry.
    let mut tab2 = join(addr, &session_id, &client_id).await;
    let resent = next_snapshot(&mut tab2).await;
    assert_eq!(resent.client_data.len(), 1);
    assert_eq!(*vote_of(&resent, "Alice"), 5);

    // Closing one tab keeps the client, with its vote, in the roster.
    tab1.close(None).await.expect("failed to close tab1");
    let after_close = next_snapshot(&mut tab2).await;
    assert_eq!(after_close.client_data.len(), 1);
    assert_eq!(*vote_of(&after_close, "Alice"), 5);

    // Closing the last tab empties the roster (observed via the debug
    // endpoint, since no connection is left to broadcast to).
    tab2.close(None).await.expect("failed to close tab2");
    let client = reqwest::Client::new();
    let deadline = tokio::time::Instant::now() + WAIT;
    loop {
        let snapshot = client
            .get(format!("http://{addr}/debug/sessions/{session_id}"))
            .send()
            .await
            .unwrap()
            .json::<RoomSnapshot>()
            .await
            .unwrap();
        if snapshot.client_data.is_empty() {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "roster never emptied after both tabs closed"
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test]
async fn test_unknown_command_type_is_ignored() {
    let addr = spawn_server().await;
    let session_id = create_session(addr).await;

    let mut ws = join(addr, &session_id, &Uuid::new_v4().to_string()).await;
    expect_init(&mut ws).await;
    next_snapshot(&mut ws).await;

    // Deprecated command types are dropped without killing the connection.
    send(&mut ws, r#"{"type":"HideVotes"}"#).await;
    send(&mut ws, r#"{"type":"UpdateData","vote":"3"}"#).await;
    let snapshot = wait_for_snapshot(&mut ws, |s| s.client_data.iter().any(|c| c.vote == 3)).await;
    assert_eq!(snapshot.client_data.len(), 1);
}

#[tokio::test]
async fn test_undecodable_frame_drops_connection() {
    let addr = spawn_server().await;
    let session_id = create_session(addr).await;

    let mut ws = join(addr, &session_id, &Uuid::new_v4().to_string()).await;
    expect_init(&mut ws).await;
    next_snapshot(&mut ws).await;

    send(&mut ws, "this is not json").await;

    // The server treats the decode failure as a leave and closes the socket.
    let result = timeout(WAIT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(result.is_ok(), "connection was not closed by the server");
}
