//! UseCase: Broadcast Hub
//!
//! join / leave / message / disconnect の各イベントを受け取り、Room Registry と履歴を更新し、
//! ルームの参加者へ通知を配信する。
//!
//! ## 状態遷移（接続 × ルーム）
//!
//! ```text
//! not-joined → joined → left
//!                     → (回復ウィンドウ) → joined   … Lifecycle Manager が吸収し、ここには届かない
//!                     → (回復ウィンドウ満了) → removed (on_disconnect)
//! ```
//!
//! Hub は dispatcher タスクからのみ呼ばれ、1 イベントずつ処理される。
//! そのため同一ルーム内のメッセージは受理した順に配信される。
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - on_join: 履歴は本人にだけ、userJoined は他の参加者にだけ届くこと
//! - on_message: 検証エラー、切り詰め、送信者以外へのブロードキャスト、送信者への ack
//! - on_leave / on_disconnect: 残った参加者への userLeft
//!
//! ### どのような状況を想定しているか
//! - 正常系：study-1 ルームでのエンドツーエンドのやり取り
//! - 異常系：roomKey / body の欠落
//! - エッジケース：二重 join、通知の送信失敗

use std::sync::Arc;

use studyhall_shared::time::{Clock, parse_rfc3339};

use crate::{
    config::HubConfig,
    domain::{
        ChatMessage, ConnectionId, MessageBody, MessageId, MessagePusher, Notification,
        PresenceSnapshot, RoomKey, RoomRegistry, RoomSummary, SenderName, Timestamp,
        ValueObjectError,
    },
};

/// クライアントから届いたイベント（DTO から変換済み、未検証）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Join {
        room_key: Option<String>,
    },
    Leave {
        room_key: Option<String>,
    },
    Message(MessageDraft),
    /// 解釈できなかったフレーム
    Malformed {
        reason: String,
    },
}

/// 送信されたメッセージの生データ
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageDraft {
    pub room_key: Option<String>,
    pub sender: Option<String>,
    pub body: Option<String>,
    /// クライアントが付けた時刻（表示用のヒントとしてのみ使う）
    pub timestamp: Option<String>,
    /// クライアントが楽観的表示に使ったローカル ID
    pub client_id: Option<String>,
}

/// Broadcast Hub
pub struct BroadcastHub {
    /// ルームと履歴（Hub だけが変更する）
    registry: RoomRegistry,
    /// MessagePusher（メッセージ通知の抽象化）
    message_pusher: Arc<dyn MessagePusher>,
    clock: Arc<dyn Clock>,
    max_body_chars: usize,
    max_sender_chars: usize,
}

impl BroadcastHub {
    pub fn new(
        config: &HubConfig,
        message_pusher: Arc<dyn MessagePusher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry: RoomRegistry::new(config.history_capacity),
            message_pusher,
            clock,
            max_body_chars: config.max_body_chars,
            max_sender_chars: config.max_sender_chars,
        }
    }

    /// イベントを種類ごとのハンドラに振り分ける
    pub async fn handle(&mut self, connection_id: &ConnectionId, event: InboundEvent) {
        match event {
            InboundEvent::Join { room_key } => {
                self.on_join(connection_id, room_key.as_deref()).await;
            }
            InboundEvent::Leave { room_key } => {
                self.on_leave(connection_id, room_key.as_deref()).await;
            }
            InboundEvent::Message(draft) => {
                // 検証エラーは on_message の中で送信者に通知済み
                let _ = self.on_message(connection_id, draft).await;
            }
            InboundEvent::Malformed { reason } => {
                tracing::warn!("Malformed event from '{}': {}", connection_id, reason);
                self.reject(connection_id, "Invalid message format", None)
                    .await;
            }
        }
    }

    /// ルームへの参加
    ///
    /// 1. Registry に参加者を追加（get-or-create）
    /// 2. 履歴のスナップショットと参加者一覧を本人にだけ送る
    /// 3. 新規参加の場合のみ、他の参加者に userJoined を送る
    pub async fn on_join(
        &mut self,
        connection_id: &ConnectionId,
        room_key: Option<&str>,
    ) -> PresenceSnapshot {
        let room_key = RoomKey::or_default(room_key);
        let now = self.now();

        let snapshot = self.registry.join(connection_id, &room_key, now);
        let history = self.registry.history(&room_key);
        tracing::info!(
            "Connection '{}' joined room '{}' ({} present, {} messages replayed)",
            connection_id,
            room_key,
            snapshot.members.len(),
            history.len()
        );

        self.push(
            connection_id,
            Notification::History {
                room_key: room_key.clone(),
                messages: history,
            },
        )
        .await;
        self.push(
            connection_id,
            Notification::Presence {
                room_key: room_key.clone(),
                members: snapshot.members.clone(),
            },
        )
        .await;

        if snapshot.newly_joined {
            let targets = self.registry.others(&room_key, connection_id);
            self.broadcast(
                targets,
                Notification::UserJoined {
                    room_key,
                    connection_id: connection_id.clone(),
                    at: now,
                },
            )
            .await;
        }

        snapshot
    }

    /// ルームからの退出。参加していた場合のみ残りの参加者に userLeft を送る
    pub async fn on_leave(&mut self, connection_id: &ConnectionId, room_key: Option<&str>) -> bool {
        let room_key = RoomKey::or_default(room_key);
        let was_present = self.registry.leave(connection_id, &room_key);
        if !was_present {
            tracing::debug!(
                "Connection '{}' left room '{}' without being present",
                connection_id,
                room_key
            );
            return false;
        }

        tracing::info!("Connection '{}' left room '{}'", connection_id, room_key);
        self.notify_left(connection_id, room_key).await;
        true
    }

    /// メッセージの受理
    ///
    /// 1. roomKey / body を検証（不正なら送信者にだけ error を返し、状態は変更しない）
    /// 2. 切り詰め・サニタイズ、ID と時刻を付与
    /// 3. 履歴に追加し、送信者以外の参加者にブロードキャスト
    /// 4. 送信者に ack を返す
    pub async fn on_message(
        &mut self,
        connection_id: &ConnectionId,
        draft: MessageDraft,
    ) -> Result<ChatMessage, ValueObjectError> {
        let validated = RoomKey::required(draft.room_key.as_deref()).and_then(|room_key| {
            MessageBody::new(draft.body.as_deref(), self.max_body_chars)
                .map(|body| (room_key, body))
        });
        let (room_key, body) = match validated {
            Ok(valid) => valid,
            Err(e) => {
                tracing::warn!("Rejected message from '{}': {}", connection_id, e);
                self.reject(connection_id, "Invalid message format", draft.client_id)
                    .await;
                return Err(e);
            }
        };

        let now = self.now();
        let message = ChatMessage {
            id: MessageId::generate(),
            sender: SenderName::sanitize(draft.sender.as_deref(), self.max_sender_chars),
            body,
            timestamp: draft
                .timestamp
                .as_deref()
                .and_then(parse_rfc3339)
                .map(Timestamp::new)
                .unwrap_or(now),
            client_id: draft.client_id.clone(),
        };

        let preview: String = message.body.as_str().chars().take(50).collect();
        tracing::info!(
            "Message {} in room '{}' from '{}': {}{}",
            message.id.as_str(),
            room_key,
            message.sender.as_str(),
            preview,
            if message.body.char_count() > 50 { "..." } else { "" }
        );

        self.registry
            .append_message(&room_key, message.clone(), now);

        let targets = self.registry.others(&room_key, connection_id);
        self.broadcast(
            targets,
            Notification::Message {
                room_key: room_key.clone(),
                message: message.clone(),
            },
        )
        .await;
        self.push(
            connection_id,
            Notification::Ack {
                room_key,
                client_id: draft.client_id,
                message: message.clone(),
            },
        )
        .await;

        Ok(message)
    }

    /// 接続の破棄。参加中の全ルームから外し、それぞれの残りの参加者に userLeft を送る
    pub async fn on_disconnect(&mut self, connection_id: &ConnectionId) -> Vec<RoomKey> {
        let rooms = self.registry.leave_all(connection_id);
        for room_key in &rooms {
            self.notify_left(connection_id, room_key.clone()).await;
        }
        tracing::info!(
            "Connection '{}' removed from {} room(s)",
            connection_id,
            rooms.len()
        );
        rooms
    }

    /// リクエストを拒否した接続にだけ error を送る
    pub async fn reject(
        &self,
        connection_id: &ConnectionId,
        message: &str,
        client_id: Option<String>,
    ) {
        self.push(
            connection_id,
            Notification::Error {
                message: message.to_string(),
                client_id,
            },
        )
        .await;
    }

    pub fn presence_count(&self, room_key: &RoomKey) -> usize {
        self.registry.presence_count(room_key)
    }

    pub fn history(&self, room_key: &RoomKey) -> Vec<ChatMessage> {
        self.registry.history(room_key)
    }

    pub fn rooms_of(&self, connection_id: &ConnectionId) -> Vec<RoomKey> {
        self.registry.rooms_of(connection_id)
    }

    pub fn summaries(&self) -> Vec<RoomSummary> {
        self.registry.summaries()
    }

    pub fn summary(&self, room_key: &RoomKey) -> Option<RoomSummary> {
        self.registry.summary(room_key)
    }

    async fn notify_left(&self, connection_id: &ConnectionId, room_key: RoomKey) {
        let targets = self.registry.others(&room_key, connection_id);
        self.broadcast(
            targets,
            Notification::UserLeft {
                room_key,
                connection_id: connection_id.clone(),
                at: self.now(),
            },
        )
        .await;
    }

    async fn push(&self, connection_id: &ConnectionId, notification: Notification) {
        if let Err(e) = self
            .message_pusher
            .push_to(connection_id, &notification)
            .await
        {
            tracing::warn!(
                "Failed to push '{}' to '{}': {}",
                notification.kind(),
                connection_id,
                e
            );
        }
    }

    async fn broadcast(&self, targets: Vec<ConnectionId>, notification: Notification) {
        if targets.is_empty() {
            return;
        }
        if let Err(e) = self
            .message_pusher
            .broadcast(targets, &notification)
            .await
        {
            tracing::warn!("Failed to broadcast '{}': {}", notification.kind(), e);
        }
    }

    fn now(&self) -> Timestamp {
        Timestamp::new(self.clock.now_millis())
    }
}
