//! Study-room chat client with reconnection support.
//!
//! Connects to the study-room server, joins the given rooms and sends what you
//! type to the current room. Messages appear immediately and are confirmed when
//! the server acknowledges them. On disconnection the client reconnects (5
//! attempts, 1 second apart) and resumes its session.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin studyhall-client -- --name Alice --room study-1
//! cargo run --bin studyhall-client -- -n Bob -r math -r physics
//! ```

use clap::Parser;

use studyhall_client::{
    ClientConfig,
    config::{DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_SERVER_URL},
    run_client,
};
use studyhall_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "studyhall-client")]
#[command(about = "Study-room chat client with optimistic sends and session recovery", long_about = None)]
struct Args {
    /// Display name shown to other members
    #[arg(short = 'n', long, default_value = "Anonymous")]
    name: String,

    /// Room to join on start (repeatable)
    #[arg(short = 'r', long = "room", default_value = "default")]
    rooms: Vec<String>,

    /// WebSocket server URL
    #[arg(short = 'u', long, env = "STUDYHALL_URL", default_value = DEFAULT_SERVER_URL)]
    url: String,

    /// Consecutive failed connection attempts before giving up
    #[arg(long, default_value_t = DEFAULT_MAX_RECONNECT_ATTEMPTS)]
    max_reconnect_attempts: u32,
}

impl From<Args> for ClientConfig {
    fn from(args: Args) -> Self {
        Self {
            url: args.url,
            name: args.name,
            rooms: args.rooms,
            max_reconnect_attempts: args.max_reconnect_attempts,
            ..ClientConfig::default()
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();

    // Run the client
    if let Err(e) = run_client(ClientConfig::from(args)).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
