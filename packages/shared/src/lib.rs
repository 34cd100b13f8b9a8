//! Shared utilities for the Enza voting server.
//!
//! This crate holds the pieces that are useful to any binary in the
//! workspace: logging setup and time helpers.

pub mod logger;
pub mod time;
