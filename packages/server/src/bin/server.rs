//! Study-room chat server.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin studyhall-server
//! cargo run --bin studyhall-server -- --host 127.0.0.1 --port 3000 --recovery-window-secs 30
//! ```

use std::{sync::Arc, time::Duration};

use clap::Parser;
use studyhall_server::{
    config::{DEFAULT_PORT, HubConfig, ServerConfig},
    domain::DEFAULT_HISTORY_CAPACITY,
    infrastructure::message_pusher::WebSocketMessagePusher,
    ui::Server,
    usecase::Dispatcher,
};
use studyhall_shared::{logger::setup_logger, time::SystemClock};

#[derive(Parser, Debug)]
#[command(name = "studyhall-server")]
#[command(about = "Group-study chat server with rooms, history and session recovery", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Seconds a session survives a dropped connection (0 disables recovery)
    #[arg(long, env = "STUDYHALL_RECOVERY_WINDOW_SECS", default_value_t = 120)]
    recovery_window_secs: u64,

    /// Messages kept per room for replay on join
    #[arg(long, env = "STUDYHALL_HISTORY_CAPACITY", default_value_t = DEFAULT_HISTORY_CAPACITY)]
    history_capacity: usize,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        Self {
            host: args.host,
            port: args.port,
            hub: HubConfig {
                history_capacity: args.history_capacity,
                recovery_window: Duration::from_secs(args.recovery_window_secs),
                ..HubConfig::default()
            },
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let config = ServerConfig::from(Args::parse());
    tracing::info!("Starting with {:?}", config);

    // Initialize dependencies in order:
    // 1. MessagePusher (WebSocket implementation)
    // 2. Dispatcher (owns rooms, history and sessions)
    // 3. Server
    let message_pusher = Arc::new(WebSocketMessagePusher::new(config.hub.max_parked_events));
    let (hub, _dispatcher) =
        Dispatcher::spawn(config.hub.clone(), message_pusher, Arc::new(SystemClock));

    let server = Server::new(hub);
    if let Err(e) = server.run(&config.host, config.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
