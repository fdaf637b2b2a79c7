//! WebSocket を使った MessagePusher 実装
//!
//! ## 責務
//!
//! - 接続ごとの送信チャンネル（`PusherChannel`）の管理
//! - 通知のシリアライズ（`Notification` → `ServerEvent` → JSON）
//! - 回復ウィンドウ中の接続宛ての通知の退避（park）と、再開時の再送
//!
//! WebSocket の生成と書き込みは UI 層（`ui/handler/websocket.rs`）が行う。
//! ここはチャンネルに文字列を流すだけで、ソケットの I/O を待たない。

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    domain::{ConnectionId, MessagePushError, MessagePusher, Notification, PusherChannel},
    infrastructure::dto::websocket::ServerEvent,
};

/// 接続ごとの送信先
#[derive(Debug)]
enum Outlet {
    /// ソケットが生きている
    Live(PusherChannel),
    /// 回復ウィンドウ中。再開時に流すフレームを溜めておく
    Parked(VecDeque<String>),
}

pub struct WebSocketMessagePusher {
    clients: Mutex<HashMap<ConnectionId, Outlet>>,
    /// 1 接続あたりに退避できるフレーム数。超えたら古いものから捨てる
    max_parked_events: usize,
}

impl WebSocketMessagePusher {
    pub fn new(max_parked_events: usize) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            max_parked_events,
        }
    }

    fn encode(notification: &Notification) -> Result<String, MessagePushError> {
        serde_json::to_string(&ServerEvent::from(notification.clone()))
            .map_err(|e| MessagePushError::PushFailed(e.to_string()))
    }

    fn deliver(
        &self,
        connection_id: &ConnectionId,
        outlet: &mut Outlet,
        frame: String,
    ) -> Result<(), MessagePushError> {
        match outlet {
            Outlet::Live(sender) => sender
                .send(frame)
                .map_err(|e| MessagePushError::PushFailed(e.to_string())),
            Outlet::Parked(backlog) => {
                backlog.push_back(frame);
                if backlog.len() > self.max_parked_events {
                    backlog.pop_front();
                    tracing::warn!(
                        "Backlog of '{}' is full; dropped the oldest parked event",
                        connection_id
                    );
                }
                Ok(())
            }
        }
    }
}

#[async_trait]
impl MessagePusher for WebSocketMessagePusher {
    async fn register_client(&self, connection_id: ConnectionId, sender: PusherChannel) {
        let mut clients = self.clients.lock().await;
        if let Some(Outlet::Parked(backlog)) = clients.remove(&connection_id) {
            tracing::debug!(
                "Flushing {} parked event(s) to '{}'",
                backlog.len(),
                connection_id
            );
            for frame in backlog {
                if let Err(e) = sender.send(frame) {
                    tracing::warn!("Failed to flush backlog to '{}': {}", connection_id, e);
                    break;
                }
            }
        }
        tracing::debug!("Client '{}' registered to MessagePusher", connection_id);
        clients.insert(connection_id, Outlet::Live(sender));
    }

    async fn park_client(&self, connection_id: &ConnectionId) {
        let mut clients = self.clients.lock().await;
        if let Some(outlet) = clients.get_mut(connection_id)
            && matches!(outlet, Outlet::Live(_))
        {
            *outlet = Outlet::Parked(VecDeque::new());
            tracing::debug!("Client '{}' parked in MessagePusher", connection_id);
        }
    }

    async fn unregister_client(&self, connection_id: &ConnectionId) {
        let mut clients = self.clients.lock().await;
        clients.remove(connection_id);
        tracing::debug!("Client '{}' unregistered from MessagePusher", connection_id);
    }

    async fn push_to(
        &self,
        connection_id: &ConnectionId,
        notification: &Notification,
    ) -> Result<(), MessagePushError> {
        let frame = Self::encode(notification)?;
        let mut clients = self.clients.lock().await;

        match clients.get_mut(connection_id) {
            Some(outlet) => {
                self.deliver(connection_id, outlet, frame)?;
                tracing::debug!("Pushed '{}' to '{}'", notification.kind(), connection_id);
                Ok(())
            }
            None => Err(MessagePushError::ClientNotFound(connection_id.to_string())),
        }
    }

    async fn broadcast(
        &self,
        targets: Vec<ConnectionId>,
        notification: &Notification,
    ) -> Result<(), MessagePushError> {
        let frame = Self::encode(notification)?;
        let mut clients = self.clients.lock().await;

        for target in targets {
            match clients.get_mut(&target) {
                // ブロードキャストでは一部の送信失敗を許容
                Some(outlet) => {
                    if let Err(e) = self.deliver(&target, outlet, frame.clone()) {
                        tracing::warn!(
                            "Failed to push '{}' to '{}': {}",
                            notification.kind(),
                            target,
                            e
                        );
                    }
                }
                None => {
                    tracing::warn!("Client '{}' not found during broadcast, skipping", target);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RoomKey, Timestamp};
    use serde_json::Value;
    use tokio::sync::mpsc;

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - push_to / broadcast が JSON フレームをチャンネルに流すこと
    // - 存在しないクライアントの扱い（push_to はエラー、broadcast はスキップ）
    // - park 中の通知の退避と、再登録時の順番通りの再送
    // - 退避数の上限（古いものから捨てる）
    // ========================================

    fn id(value: &str) -> ConnectionId {
        ConnectionId::new(value.to_string()).unwrap()
    }

    fn user_left(who: &str, at: i64) -> Notification {
        Notification::UserLeft {
            room_key: RoomKey::or_default(Some("study-1")),
            connection_id: id(who),
            at: Timestamp::new(at),
        }
    }

    fn error(message: &str) -> Notification {
        Notification::Error {
            message: message.to_string(),
            client_id: None,
        }
    }

    fn parse(frame: Option<String>) -> Value {
        serde_json::from_str(&frame.unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_push_to_success() {
        // テスト項目: 特定のクライアントに JSON フレームを送信できる
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new(8);
        let (tx, mut rx) = mpsc::unbounded_channel();
        pusher.register_client(id("alice"), tx).await;

        // when (操作):
        let result = pusher.push_to(&id("alice"), &error("boom")).await;

        // then (期待する結果):
        assert!(result.is_ok());
        let frame = parse(rx.recv().await);
        assert_eq!(frame["type"], "error");
        assert_eq!(frame["message"], "boom");
    }

    #[tokio::test]
    async fn test_push_to_client_not_found() {
        // テスト項目: 存在しないクライアントへの送信はエラーを返す
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new(8);

        // when (操作):
        let result = pusher.push_to(&id("nonexistent"), &error("boom")).await;

        // then (期待する結果):
        assert!(matches!(result, Err(MessagePushError::ClientNotFound(_))));
    }

    #[tokio::test]
    async fn test_broadcast_partial_failure() {
        // テスト項目: ブロードキャスト時、一部のクライアントが存在しなくても成功する
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new(8);
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, rx2) = mpsc::unbounded_channel();
        pusher.register_client(id("alice"), tx1).await;
        pusher.register_client(id("bob"), tx2).await;
        drop(rx2);

        // when (操作):
        let targets = vec![id("alice"), id("bob"), id("nonexistent")];
        let result = pusher.broadcast(targets, &user_left("carol", 0)).await;

        // then (期待する結果):
        assert!(result.is_ok());
        let frame = parse(rx1.recv().await);
        assert_eq!(frame["type"], "userLeft");
        assert_eq!(frame["connectionId"], "carol");
    }

    #[tokio::test]
    async fn test_parked_events_are_flushed_in_order_on_register() {
        // テスト項目: park 中の通知は退避され、再登録時に順番通りに流される
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new(8);
        let (old_tx, _old_rx) = mpsc::unbounded_channel();
        pusher.register_client(id("bob"), old_tx).await;
        pusher.park_client(&id("bob")).await;

        // when (操作):
        for n in 0..3 {
            pusher.push_to(&id("bob"), &user_left("x", n)).await.unwrap();
        }
        let (new_tx, mut new_rx) = mpsc::unbounded_channel();
        pusher.register_client(id("bob"), new_tx).await;
        pusher.push_to(&id("bob"), &error("after resume")).await.unwrap();

        // then (期待する結果):
        for n in 0..3 {
            let frame = parse(new_rx.recv().await);
            assert_eq!(frame["timestamp"], Timestamp::new(n).to_rfc3339());
        }
        assert_eq!(parse(new_rx.recv().await)["message"], "after resume");
    }

    #[tokio::test]
    async fn test_parked_backlog_drops_oldest_when_full() {
        // テスト項目: 退避数が上限を超えると古いものから捨てられる
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new(2);
        let (tx, _rx) = mpsc::unbounded_channel();
        pusher.register_client(id("bob"), tx).await;
        pusher.park_client(&id("bob")).await;

        // when (操作):
        for n in 0..3 {
            pusher.push_to(&id("bob"), &user_left("x", n)).await.unwrap();
        }
        let (new_tx, mut new_rx) = mpsc::unbounded_channel();
        pusher.register_client(id("bob"), new_tx).await;

        // then (期待する結果):
        assert_eq!(parse(new_rx.recv().await)["timestamp"], Timestamp::new(1).to_rfc3339());
        assert_eq!(parse(new_rx.recv().await)["timestamp"], Timestamp::new(2).to_rfc3339());
        assert!(new_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unregister_discards_backlog() {
        // テスト項目: 登録解除後は送信先が無くなり、退避していた通知も破棄される
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new(8);
        let (tx, _rx) = mpsc::unbounded_channel();
        pusher.register_client(id("bob"), tx).await;
        pusher.park_client(&id("bob")).await;
        pusher.push_to(&id("bob"), &error("lost")).await.unwrap();

        // when (操作):
        pusher.unregister_client(&id("bob")).await;
        let (new_tx, mut new_rx) = mpsc::unbounded_channel();
        pusher.register_client(id("bob"), new_tx).await;

        // then (期待する結果):
        assert!(new_rx.try_recv().is_err());
    }
}
