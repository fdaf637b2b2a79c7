//! Server configuration.

use std::time::Duration;

use crate::domain::DEFAULT_HISTORY_CAPACITY;

/// Default port, matching the port the browser client expects.
pub const DEFAULT_PORT: u16 = 3000;

/// Default recovery window after a transport loss (2 minutes).
pub const DEFAULT_RECOVERY_WINDOW: Duration = Duration::from_secs(120);

/// Limits and timings of the broadcast hub and the lifecycle manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    /// Number of messages kept per room for replay on join
    pub history_capacity: usize,
    /// Message bodies longer than this (in characters) are truncated
    pub max_body_chars: usize,
    /// Sender names longer than this (in characters) are truncated
    pub max_sender_chars: usize,
    /// How long a session survives a transport loss; zero disables recovery
    pub recovery_window: Duration,
    /// Events kept for a recovering session before the oldest are dropped
    pub max_parked_events: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            max_body_chars: 500,
            max_sender_chars: 30,
            recovery_window: DEFAULT_RECOVERY_WINDOW,
            max_parked_events: 256,
        }
    }
}

/// Process-level configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub hub: HubConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            hub: HubConfig::default(),
        }
    }
}
