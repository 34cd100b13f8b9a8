//! Session directory and shared heartbeat.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use enza_shared::time::timestamp_to_jst_rfc3339;

use crate::domain::SessionId;

use super::session::Session;

/// Interval between keepalive pings pushed to every attached connection.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// Creates, looks up, and destroys sessions, and runs one heartbeat loop
/// while at least one session exists.
///
/// The heartbeat is owned by the registry instance rather than being a
/// process-global, so registries in different tests do not interfere.
pub struct SessionRegistry {
    inner: Mutex<RegistryInner>,
}

struct RegistryInner {
    sessions: HashMap<SessionId, Arc<Session>>,
    heartbeat: Option<JoinHandle<()>>,
}

impl SessionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(RegistryInner {
                sessions: HashMap::new(),
                heartbeat: None,
            }),
        })
    }

    /// Mint a fresh session and start the heartbeat if it was the first.
    pub async fn create_session(self: &Arc<Self>) -> SessionId {
        let id = SessionId::generate();
        let session = Session::new(id, Arc::downgrade(self));

        let mut inner = self.inner.lock().await;
        inner.sessions.insert(id, session);
        tracing::info!("Created session {}", id);

        if inner.heartbeat.is_none() {
            tracing::info!("First session created, starting heartbeat");
            inner.heartbeat = Some(tokio::spawn(heartbeat_loop(Arc::downgrade(self))));
        }

        id
    }

    pub async fn get_session(&self, id: SessionId) -> Option<Arc<Session>> {
        let inner = self.inner.lock().await;
        inner.sessions.get(&id).cloned()
    }

    /// Erase a session (normally instructed by its idle timer) and stop the
    /// heartbeat when the last one goes.
    pub async fn remove_session(&self, id: SessionId) {
        let mut inner = self.inner.lock().await;

        match inner.sessions.remove(&id) {
            Some(session) => {
                tracing::info!(
                    "Removed session {} (created {})",
                    id,
                    timestamp_to_jst_rfc3339(session.created_at())
                );
            }
            None => {
                tracing::warn!("Remove requested for unknown session {}", id);
                return;
            }
        }

        if inner.sessions.is_empty() {
            if let Some(heartbeat) = inner.heartbeat.take() {
                tracing::info!("All sessions removed, stopping heartbeat");
                heartbeat.abort();
            }
        }
    }

    pub async fn session_count(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.sessions.len()
    }

    /// Whether the shared heartbeat loop is currently running.
    pub async fn heartbeat_running(&self) -> bool {
        let inner = self.inner.lock().await;
        inner.heartbeat.is_some()
    }
}

/// Tick every [`HEARTBEAT_INTERVAL`] and push a ping into every connection
/// of every session. Holds only a weak registry reference so a dropped
/// registry ends its heartbeat at the next tick.
async fn heartbeat_loop(registry: Weak<SessionRegistry>) {
    let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let Some(registry) = registry.upgrade() else {
            return;
        };
        let sessions: Vec<Arc<Session>> = {
            let inner = registry.inner.lock().await;
            inner.sessions.values().cloned().collect()
        };
        tracing::debug!("Heartbeat: pinging {} session(s)", sessions.len());
        for session in sessions {
            session.ping_all().await;
        }
    }
}
