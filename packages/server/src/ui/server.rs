//! Server execution logic.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::hub::SessionRegistry;

use super::{
    handler::{
        http::{create_session, debug_session_state, get_session_status, health_check},
        websocket::join_session_handler,
    },
    signal::shutdown_signal,
    state::AppState,
};

/// Real-time planning poker server.
///
/// This struct encapsulates the server configuration and provides methods to run the server.
///
/// # Example
///
/// ```ignore
/// let registry = SessionRegistry::new();
/// let server = Server::new(registry);
/// server.run("127.0.0.1".to_string(), 3001).await?;
/// ```
pub struct Server {
    /// Directory of live voting sessions
    registry: Arc<SessionRegistry>,
}

impl Server {
    /// Create a new Server instance
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Assemble the router with all HTTP and WebSocket routes.
    ///
    /// Exposed separately from [`run`](Self::run) so integration tests can
    /// serve it on an ephemeral port.
    pub fn router(&self) -> Router {
        let app_state = Arc::new(AppState {
            registry: self.registry.clone(),
        });

        Router::new()
            // WebSocket エンドポイント
            .route(
                "/api/sessions/{session_id}/join/{client_id}",
                get(join_session_handler),
            )
            // HTTP エンドポイント
            .route("/api/health", get(health_check))
            .route("/api/sessions/create", post(create_session))
            .route("/api/sessions/{session_id}", get(get_session_status))
            .route("/debug/sessions/{session_id}", get(debug_session_state))
            .layer(TraceLayer::new_for_http())
            .with_state(app_state)
    }

    /// Run the voting server
    ///
    /// # Arguments
    ///
    /// * `host` - The host address to bind to (e.g., "127.0.0.1")
    /// * `port` - The port number to bind to (e.g., 3001)
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address or
    /// if there's an error during server execution.
    pub async fn run(self, host: String, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        let app = self.router();

        // Bind the server to the host and port
        let bind_addr = format!("{}:{}", host, port);
        let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

        // Start the server
        tracing::info!("Voting server listening on {}", listener.local_addr()?);
        tracing::info!(
            "Join sessions at: ws://{}/api/sessions/{{session_id}}/join/{{client_id}}",
            bind_addr
        );
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        // Set up graceful shutdown signal handler
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");

        Ok(())
    }
}
