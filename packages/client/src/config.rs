//! Client configuration.

use std::time::Duration;

pub const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:3000/ws";
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_PENDING_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// WebSocket endpoint of the server
    pub url: String,
    /// Display name sent as `sender`
    pub name: String,
    /// Rooms joined right after the first connection
    pub rooms: Vec<String>,
    /// Consecutive failed connection attempts before giving up
    pub max_reconnect_attempts: u32,
    /// Fixed delay between reconnection attempts
    pub reconnect_interval: Duration,
    /// Pending messages older than this are marked as failed
    pub pending_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SERVER_URL.to_string(),
            name: "Anonymous".to_string(),
            rooms: vec!["default".to_string()],
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            pending_timeout: DEFAULT_PENDING_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// 接続先 URL。再開するセッションがあれば `session` クエリを付ける
    ///
    /// URL に既にクエリがあれば `&` で繋ぐ。
    pub fn connect_url(&self, session: Option<&str>) -> String {
        match session {
            Some(session) => {
                let separator = if self.url.contains('?') { '&' } else { '?' };
                format!("{}{}session={}", self.url, separator, session)
            }
            None => self.url.clone(),
        }
    }
}
