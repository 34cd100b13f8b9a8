//! Server state shared across handlers.

use std::sync::Arc;

use crate::hub::SessionRegistry;

/// Shared application state
pub struct AppState {
    /// Directory of live voting sessions
    pub registry: Arc<SessionRegistry>,
}
