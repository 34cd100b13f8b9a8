//! One participant's identity and vote state.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::domain::ConnectionId;

use super::coalesce::CoalescingSlot;

/// Sentinel vote meaning "no vote cast".
pub const NO_VOTE: i32 = -1;

/// Validation failure for the vote token of an UpdateData command. The
/// offending field is dropped; the rest of the command still applies.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid vote value: '{0}'")]
pub struct InvalidVoteError(pub String);

/// One logical participant. Stays in its session's directory even with an
/// empty connection set, so a reconnecting tab finds its name and vote
/// again; only the broadcast roster hides it meanwhile.
pub struct Client {
    name: String,
    vote: i32,
    active: bool,
    connections: HashMap<ConnectionId, Arc<CoalescingSlot>>,
}

impl Client {
    pub fn new() -> Self {
        Self {
            name: String::new(),
            vote: NO_VOTE,
            active: true,
            connections: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vote(&self) -> i32 {
        self.vote
    }

    pub fn active(&self) -> bool {
        self.active
    }

    /// Whether this client shows up in the broadcast roster.
    pub fn is_present(&self) -> bool {
        !self.connections.is_empty()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Delivery slots of all live connections of this client.
    pub fn slots(&self) -> impl Iterator<Item = &Arc<CoalescingSlot>> {
        self.connections.values()
    }

    /// Register a live connection for this client.
    pub fn attach(&mut self, connection_id: ConnectionId, slot: Arc<CoalescingSlot>) {
        self.connections.insert(connection_id, slot);
    }

    /// Drop a connection; name and vote are kept for reattachment.
    /// Returns `false` when the connection was unknown.
    pub fn detach(&mut self, connection_id: ConnectionId) -> bool {
        self.connections.remove(&connection_id).is_some()
    }

    /// Apply the fields of an UpdateData command.
    ///
    /// Fields apply independently: an unparsable vote token yields
    /// [`InvalidVoteError`] but does not undo the other fields. Setting
    /// `active = false` forces the vote back to [`NO_VOTE`], and a vote from
    /// an inactive participant is discarded, so `active == false` always
    /// implies `vote == NO_VOTE`.
    pub fn apply_update(
        &mut self,
        username: Option<&str>,
        vote: Option<&str>,
        active: Option<bool>,
    ) -> Result<(), InvalidVoteError> {
        if let Some(username) = username {
            self.name = username.to_string();
        }
        if let Some(active) = active {
            self.active = active;
            if !active {
                self.vote = NO_VOTE;
            }
        }
        if let Some(token) = vote {
            if !self.active {
                // Inactive participants are excluded from voting.
                return Ok(());
            }
            match token.trim().parse::<i32>() {
                Ok(vote) => self.vote = vote,
                Err(_) => return Err(InvalidVoteError(token.to_string())),
            }
        }
        Ok(())
    }

    /// Reset the vote to the "no vote cast" sentinel.
    pub fn clear_vote(&mut self) {
        self.vote = NO_VOTE;
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}
