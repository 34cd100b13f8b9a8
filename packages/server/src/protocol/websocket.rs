//! WebSocket wire format: inbound command frames and outbound snapshots.

use serde::{Deserialize, Serialize};

/// Message type tags on server-initiated messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    Init,
}

/// One-time greeting for a client id the session has never seen before,
/// sent ahead of the client's first state snapshot.
#[derive(Debug, Serialize)]
pub struct InitMessage {
    pub r#type: MessageType,
}

impl InitMessage {
    pub fn new() -> Self {
        Self {
            r#type: MessageType::Init,
        }
    }
}

impl Default for InitMessage {
    fn default() -> Self {
        Self::new()
    }
}

/// Raw inbound frame. Everything except `type` is optional; unknown extra
/// fields are ignored.
#[derive(Debug, Deserialize)]
pub struct InboundFrame {
    pub r#type: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub vote: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
}

/// A decoded session command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    UpdateData {
        username: Option<String>,
        vote: Option<String>,
        active: Option<bool>,
    },
    ClearVotes,
    ShowVotes,
    SetOptions {
        body: Option<String>,
    },
}

impl InboundFrame {
    /// Decode the frame into a command. Returns `None` for an unrecognized
    /// `type`, which callers drop silently (forward compatibility).
    pub fn into_command(self) -> Option<Command> {
        match self.r#type.as_str() {
            "UpdateData" => Some(Command::UpdateData {
                username: self.username,
                vote: self.vote,
                active: self.active,
            }),
            "ClearVotes" => Some(Command::ClearVotes),
            "ShowVotes" => Some(Command::ShowVotes),
            "SetOptions" => Some(Command::SetOptions { body: self.body }),
            _ => None,
        }
    }
}

/// Authoritative room state, pushed to every connection after each accepted
/// command. Recomputed on every broadcast, never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub votes_visible: bool,
    pub vote_options: String,
    pub client_data: Vec<ClientEntry>,
}

/// Roster entry for one client with at least one live connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientEntry {
    pub username: String,
    pub vote: i32,
    pub active: bool,
}
