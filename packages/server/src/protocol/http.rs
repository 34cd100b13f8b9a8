//! HTTP API response DTOs.

use serde::{Deserialize, Serialize};

/// Response body of `POST /api/sessions/create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub uuid: String,
}
