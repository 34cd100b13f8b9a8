//! One voting room: client directory, shared vote state, command dispatch,
//! idle reclamation, and broadcast fan-out.
//!
//! Every read and write of session-level state goes through one
//! `tokio::sync::Mutex`, held for the duration of each `join` / `leave` /
//! `handle_command`. Connection read loops and the heartbeat all funnel
//! through that lock; only the per-connection [`CoalescingSlot`] is touched
//! concurrently.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::AbortHandle;

use enza_shared::time::get_jst_timestamp;

use crate::domain::{ClientId, ConnectionId, SessionId};
use crate::protocol::websocket::{ClientEntry, Command, InitMessage, RoomSnapshot};

use super::client::Client;
use super::coalesce::CoalescingSlot;
use super::registry::SessionRegistry;

/// Inactivity window after which a session with no connections is reclaimed.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Debounce window for the vote-visibility toggles.
pub const TOGGLE_COOLDOWN: Duration = Duration::from_secs(1);

/// Vote scale presented to clients until the room overrides it.
pub const DEFAULT_VOTE_OPTIONS: &str = "1,2,3,5,8,13,20";

/// One voting room.
pub struct Session {
    pub id: SessionId,
    created_at: i64,
    registry: Weak<SessionRegistry>,
    state: Mutex<SessionState>,
}

struct SessionState {
    vote_options: String,
    votes_visible: bool,
    clients: HashMap<ClientId, Client>,
    cooldown: bool,
    idle_timer: Option<AbortHandle>,
}

impl SessionState {
    fn total_connections(&self) -> usize {
        self.clients.values().map(Client::connection_count).sum()
    }
}

impl Session {
    pub(crate) fn new(id: SessionId, registry: Weak<SessionRegistry>) -> Arc<Self> {
        Arc::new(Self {
            id,
            created_at: get_jst_timestamp(),
            registry,
            state: Mutex::new(SessionState {
                vote_options: DEFAULT_VOTE_OPTIONS.to_string(),
                votes_visible: false,
                clients: HashMap::new(),
                cooldown: false,
                idle_timer: None,
            }),
        })
    }

    /// Unix timestamp (JST, milliseconds) at which this session was created.
    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    /// Attach a connection for `client_id`, creating the client on first
    /// sight.
    ///
    /// A brand-new client id gets the `Init` greeting on this connection
    /// before any snapshot. A client's first connection changes the roster
    /// and broadcasts to everyone; an additional connection (another tab)
    /// only receives the current state itself.
    pub async fn join(
        &self,
        client_id: ClientId,
        connection_id: ConnectionId,
        slot: Arc<CoalescingSlot>,
    ) {
        let mut state = self.state.lock().await;

        if let Some(timer) = state.idle_timer.take() {
            tracing::debug!("Session {}: connection attached, idle timer canceled", self.id);
            timer.abort();
        }

        let brand_new = !state.clients.contains_key(&client_id);
        let client = state.clients.entry(client_id).or_default();
        let first_connection = client.connection_count() == 0;
        client.attach(connection_id, slot.clone());
        tracing::info!(
            "Session {}: client '{}' attached connection {}",
            self.id,
            client_id,
            connection_id
        );

        if brand_new {
            // The slot was registered under this lock and nothing else knows
            // it yet, so the greeting goes out ahead of any snapshot.
            match serde_json::to_string(&InitMessage::new()) {
                Ok(greeting) => {
                    if let Err(e) = slot.deliver(Some(greeting), false).await {
                        tracing::warn!(
                            "Session {}: failed to greet client '{}': {}",
                            self.id,
                            client_id,
                            e
                        );
                    }
                }
                Err(e) => {
                    tracing::error!("Session {}: failed to encode greeting: {}", self.id, e);
                }
            }
        }

        if first_connection {
            self.broadcast_locked(&state);
        } else {
            self.send_to_slot(&state, &slot);
        }
    }

    /// Detach a connection. Unknown client or connection ids are logged
    /// no-ops. Dropping the last connection of the whole session arms the
    /// idle timer.
    pub async fn leave(self: &Arc<Self>, client_id: ClientId, connection_id: ConnectionId) {
        let mut state = self.state.lock().await;

        match state.clients.get_mut(&client_id) {
            Some(client) => {
                if !client.detach(connection_id) {
                    tracing::warn!(
                        "Session {}: leave for unknown connection {} of client '{}'",
                        self.id,
                        connection_id,
                        client_id
                    );
                    return;
                }
                tracing::info!(
                    "Session {}: client '{}' detached connection {}",
                    self.id,
                    client_id,
                    connection_id
                );
            }
            None => {
                tracing::warn!(
                    "Session {}: leave for unknown client '{}'",
                    self.id,
                    client_id
                );
                return;
            }
        }

        self.broadcast_locked(&state);

        if state.total_connections() == 0 {
            self.arm_idle_timer(&mut state);
        }
    }

    /// Handle one decoded command on behalf of `client_id`, then broadcast
    /// the recomputed state. A cooldown-suppressed toggle changes nothing
    /// and broadcasts nothing.
    pub async fn handle_command(self: &Arc<Self>, client_id: ClientId, command: Command) {
        let mut state = self.state.lock().await;

        match command {
            Command::UpdateData {
                username,
                vote,
                active,
            } => {
                let Some(client) = state.clients.get_mut(&client_id) else {
                    tracing::warn!(
                        "Session {}: UpdateData from unknown client '{}'",
                        self.id,
                        client_id
                    );
                    return;
                };
                if let Err(e) = client.apply_update(username.as_deref(), vote.as_deref(), active) {
                    tracing::warn!(
                        "Session {}: client '{}' sent {}; field ignored",
                        self.id,
                        client_id,
                        e
                    );
                }
            }
            Command::ClearVotes => {
                if state.cooldown {
                    tracing::debug!("Session {}: ClearVotes suppressed by cooldown", self.id);
                    return;
                }
                for client in state.clients.values_mut() {
                    client.clear_vote();
                }
                state.votes_visible = false;
                self.start_cooldown(&mut state);
            }
            Command::ShowVotes => {
                if state.cooldown {
                    tracing::debug!("Session {}: ShowVotes suppressed by cooldown", self.id);
                    return;
                }
                state.votes_visible = true;
                self.start_cooldown(&mut state);
            }
            Command::SetOptions { body } => match body {
                Some(options) => {
                    tracing::info!("Session {}: vote options set to '{}'", self.id, options);
                    state.vote_options = options;
                }
                None => {
                    tracing::debug!("Session {}: SetOptions without body ignored", self.id);
                }
            },
        }

        self.broadcast_locked(&state);
    }

    /// Push a keepalive ping into every attached connection's slot, each as
    /// its own fire-and-forget task.
    pub async fn ping_all(&self) {
        let state = self.state.lock().await;
        for client in state.clients.values() {
            for slot in client.slots() {
                let slot = Arc::clone(slot);
                tokio::spawn(async move {
                    if let Err(e) = slot.deliver(None, true).await {
                        tracing::debug!("Ping delivery failed: {}", e);
                    }
                });
            }
        }
    }

    /// Current wire snapshot of this room.
    pub async fn snapshot(&self) -> RoomSnapshot {
        let state = self.state.lock().await;
        compose_snapshot(&state)
    }

    /// Number of live connections across all clients.
    pub async fn connection_count(&self) -> usize {
        let state = self.state.lock().await;
        state.total_connections()
    }

    /// Serialize the current state and fan it out to every attached
    /// connection. An encoding failure aborts only this broadcast.
    fn broadcast_locked(&self, state: &SessionState) {
        let snapshot = compose_snapshot(state);
        let payload = match serde_json::to_string(&snapshot) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("Session {}: failed to encode snapshot: {}", self.id, e);
                return;
            }
        };

        for client in state.clients.values() {
            for slot in client.slots() {
                let slot = Arc::clone(slot);
                let payload = payload.clone();
                tokio::spawn(async move {
                    if let Err(e) = slot.deliver(Some(payload), false).await {
                        tracing::debug!("Snapshot delivery failed: {}", e);
                    }
                });
            }
        }
    }

    /// Send the current state to one connection only (extra tab of an
    /// already-present client; the roster did not change).
    fn send_to_slot(&self, state: &SessionState, slot: &Arc<CoalescingSlot>) {
        let snapshot = compose_snapshot(state);
        let payload = match serde_json::to_string(&snapshot) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("Session {}: failed to encode snapshot: {}", self.id, e);
                return;
            }
        };

        let slot = Arc::clone(slot);
        tokio::spawn(async move {
            if let Err(e) = slot.deliver(Some(payload), false).await {
                tracing::debug!("Snapshot delivery failed: {}", e);
            }
        });
    }

    fn start_cooldown(self: &Arc<Self>, state: &mut SessionState) {
        state.cooldown = true;
        let session = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(TOGGLE_COOLDOWN).await;
            session.state.lock().await.cooldown = false;
        });
    }

    fn arm_idle_timer(self: &Arc<Self>, state: &mut SessionState) {
        tracing::info!("Session {}: no connections left, idle timer armed", self.id);
        let session = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(IDLE_TIMEOUT).await;
            session.idle_check().await;
        });
        state.idle_timer = Some(handle.abort_handle());
    }

    /// Idle timer body. A connection may have attached between the timer
    /// firing and this check running, so the count is re-checked under the
    /// lock before the registry is instructed to destroy the session.
    async fn idle_check(&self) {
        {
            let state = self.state.lock().await;
            if state.total_connections() > 0 {
                return;
            }
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.remove_session(self.id).await;
        }
    }
}

/// Build the wire snapshot: clients with at least one live connection,
/// ordered by client id for a stable roster.
fn compose_snapshot(state: &SessionState) -> RoomSnapshot {
    let mut present: Vec<(&ClientId, &Client)> = state
        .clients
        .iter()
        .filter(|(_, client)| client.is_present())
        .collect();
    present.sort_by_key(|(id, _)| **id);

    RoomSnapshot {
        votes_visible: state.votes_visible,
        vote_options: state.vote_options.clone(),
        client_data: present
            .into_iter()
            .map(|(_, client)| ClientEntry {
                username: client.name().to_string(),
                vote: client.vote(),
                active: client.active(),
            })
            .collect(),
    }
}
