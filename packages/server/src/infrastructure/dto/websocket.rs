//! WebSocket event DTOs.
//!
//! 全てのフレームは `"type"` でタグ付けされた JSON テキストで、フィールド名は camelCase。
//! クライアントも同じ型を使ってシリアライズ・デシリアライズする。

use serde::{Deserialize, Serialize};

/// クライアント → サーバー
///
/// フィールドは全て省略可能。欠落や不正値の扱いは UseCase 層が決める。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    Join {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_key: Option<String>,
    },
    Leave {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_key: Option<String>,
    },
    Message {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_key: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
        /// 楽観的表示に使ったローカル ID（ack / error でそのまま返る）
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_id: Option<String>,
    },
}

/// 確定済みメッセージ
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: String,
    pub sender: String,
    pub body: String,
    /// RFC 3339 (UTC, millisecond precision)
    pub timestamp: String,
    /// 送信者が付けたローカル ID。ack を取りこぼしても履歴から送信を突き合わせられる
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

/// サーバー → クライアント
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// ソケットごとの最初のフレーム。`resumeToken` は本人にだけ送られ、再接続時の
    /// `?session=` に使う（`connectionId` は他の参加者にも見える公開 ID）
    Session {
        connection_id: String,
        resume_token: String,
        resumed: bool,
    },
    History {
        room_key: String,
        messages: Vec<MessageDto>,
    },
    Presence {
        room_key: String,
        connection_ids: Vec<String>,
    },
    Message {
        room_key: String,
        message: MessageDto,
    },
    Ack {
        room_key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_id: Option<String>,
        message: MessageDto,
    },
    UserJoined {
        room_key: String,
        connection_id: String,
        timestamp: String,
    },
    UserLeft {
        room_key: String,
        connection_id: String,
        timestamp: String,
    },
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_id: Option<String>,
    },
}
