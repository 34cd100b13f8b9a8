//! The session broadcast hub.
//!
//! Holds per-room shared state, serializes every mutation, and fans the
//! latest authoritative state out to all attached connections:
//!
//! - [`CoalescingSlot`]: per-connection latest-wins delivery
//! - [`Client`]: one participant, possibly several simultaneous connections
//! - [`Session`]: one room with its clients, vote state, and timers
//! - [`SessionRegistry`]: session directory and shared heartbeat

mod client;
mod coalesce;
mod registry;
mod session;

pub use client::{Client, InvalidVoteError, NO_VOTE};
pub use coalesce::CoalescingSlot;
pub use registry::{HEARTBEAT_INTERVAL, SessionRegistry};
pub use session::{DEFAULT_VOTE_OPTIONS, IDLE_TIMEOUT, Session, TOGGLE_COOLDOWN};
