//! HTTP API response DTOs.

use serde::{Deserialize, Serialize};

/// `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthDto {
    pub status: String,
    /// 起動からの経過秒数
    pub uptime: u64,
}

/// `GET /api/rooms`, `GET /api/rooms/{room_key}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummaryDto {
    pub key: String,
    pub participants: Vec<String>,
    pub message_count: usize,
    /// RFC 3339 (UTC, millisecond precision)
    pub created_at: String,
}
