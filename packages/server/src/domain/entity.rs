//! エンティティ

use std::collections::HashSet;

use super::{
    history::HistoryBuffer,
    value_object::{ConnectionId, MessageBody, MessageId, RoomKey, SenderName, Timestamp},
};

/// 確定済みのチャットメッセージ
///
/// 履歴に追加された後は変更されない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: MessageId,
    pub sender: SenderName,
    pub body: MessageBody,
    pub timestamp: Timestamp,
    /// 送信者のローカル ID（あれば）。再接続後の突き合わせに使う
    pub client_id: Option<String>,
}

/// ルーム
///
/// プレゼンス（参加中の接続の集合）と有界の履歴を持つ。
#[derive(Debug, Clone)]
pub struct Room {
    pub key: RoomKey,
    presence: HashSet<ConnectionId>,
    history: HistoryBuffer,
    pub created_at: Timestamp,
}

impl Room {
    pub fn new(key: RoomKey, created_at: Timestamp, history_capacity: usize) -> Self {
        Self {
            key,
            presence: HashSet::new(),
            history: HistoryBuffer::new(history_capacity),
            created_at,
        }
    }

    /// 参加者を追加する。新規に追加された場合は `true`
    pub fn join(&mut self, connection_id: ConnectionId) -> bool {
        self.presence.insert(connection_id)
    }

    /// 参加者を削除する。参加していた場合は `true`
    pub fn leave(&mut self, connection_id: &ConnectionId) -> bool {
        self.presence.remove(connection_id)
    }

    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.presence.contains(connection_id)
    }

    pub fn presence_count(&self) -> usize {
        self.presence.len()
    }

    /// 参加者一覧（ID 順）
    pub fn members(&self) -> Vec<ConnectionId> {
        let mut members: Vec<ConnectionId> = self.presence.iter().cloned().collect();
        members.sort();
        members
    }

    /// 指定した接続以外の参加者（ブロードキャスト対象）
    pub fn others(&self, exclude: &ConnectionId) -> Vec<ConnectionId> {
        self.presence
            .iter()
            .filter(|id| *id != exclude)
            .cloned()
            .collect()
    }

    pub fn append_message(&mut self, message: ChatMessage) {
        self.history.append(message);
    }

    pub fn history(&self) -> Vec<ChatMessage> {
        self.history.snapshot()
    }

    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            key: self.key.clone(),
            participants: self.members(),
            message_count: self.history.len(),
            created_at: self.created_at,
        }
    }
}

/// HTTP API 向けのルーム概要（読み取り専用のコピー）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSummary {
    pub key: RoomKey,
    pub participants: Vec<ConnectionId>,
    pub message_count: usize,
    pub created_at: Timestamp,
}
