//! サーバーからクライアントへの通知（ドメインイベント）
//!
//! ワイヤーフォーマットへの変換は Infrastructure 層（`dto::conversion`）が担当する。

use super::{
    entity::ChatMessage,
    value_object::{ConnectionId, RoomKey, Timestamp},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// join した本人にだけ送る履歴のリプレイ
    History {
        room_key: RoomKey,
        messages: Vec<ChatMessage>,
    },
    /// join した本人にだけ送る参加者一覧
    Presence {
        room_key: RoomKey,
        members: Vec<ConnectionId>,
    },
    /// 送信者以外の参加者へのブロードキャスト
    Message {
        room_key: RoomKey,
        message: ChatMessage,
    },
    /// 送信者本人への確定通知（クライアント側の楽観的表示との突き合わせ用）
    Ack {
        room_key: RoomKey,
        client_id: Option<String>,
        message: ChatMessage,
    },
    UserJoined {
        room_key: RoomKey,
        connection_id: ConnectionId,
        at: Timestamp,
    },
    UserLeft {
        room_key: RoomKey,
        connection_id: ConnectionId,
        at: Timestamp,
    },
    /// リクエストを拒否した接続にだけ送るエラー
    Error {
        message: String,
        client_id: Option<String>,
    },
}

impl Notification {
    /// ログ出力用のイベント名
    pub fn kind(&self) -> &'static str {
        match self {
            Self::History { .. } => "history",
            Self::Presence { .. } => "presence",
            Self::Message { .. } => "message",
            Self::Ack { .. } => "ack",
            Self::UserJoined { .. } => "userJoined",
            Self::UserLeft { .. } => "userLeft",
            Self::Error { .. } => "error",
        }
    }
}
