//! Real-time planning poker server.
//!
//! Holds every voting session in memory and pushes the authoritative room
//! state to all connected participants over WebSocket.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin enza-server
//! cargo run --bin enza-server -- --host 0.0.0.0 --port 3001
//! ```

use clap::Parser;

use enza_server::{hub::SessionRegistry, ui::Server};
use enza_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "server")]
#[command(about = "Real-time planning poker server", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "3001")]
    port: u16,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let args = Args::parse();

    let registry = SessionRegistry::new();
    let server = Server::new(registry);
    if let Err(e) = server.run(args.host, args.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
