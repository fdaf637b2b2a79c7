//! MessagePusher trait 定義
//!
//! ドメイン層が必要とする「クライアントへの通知」のインターフェース。
//! 具体的な実装（WebSocket）は Infrastructure 層が提供します（依存性の逆転）。

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{error::MessagePushError, notification::Notification, value_object::ConnectionId};

/// クライアントの送信タスクへつながるチャンネル（シリアライズ済みのフレームを流す）
pub type PusherChannel = mpsc::UnboundedSender<String>;

/// クライアントへの通知の抽象化
///
/// 送信は fire-and-forget。実装はソケットの I/O を待ってはならない。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagePusher: Send + Sync {
    /// クライアントの送信チャンネルを登録する
    ///
    /// 退避中（park）のバックログがあれば、登録したチャンネルへ順番通りに流し込む。
    async fn register_client(&self, connection_id: ConnectionId, sender: PusherChannel);

    /// 送信チャンネルを外し、以降の通知をバックログに退避する（回復ウィンドウ中）
    async fn park_client(&self, connection_id: &ConnectionId);

    /// クライアントの登録を解除する（バックログも破棄）
    async fn unregister_client(&self, connection_id: &ConnectionId);

    /// 特定のクライアントに通知する
    async fn push_to(
        &self,
        connection_id: &ConnectionId,
        notification: &Notification,
    ) -> Result<(), MessagePushError>;

    /// 複数のクライアントに通知する（一部の失敗は許容）
    async fn broadcast(
        &self,
        targets: Vec<ConnectionId>,
        notification: &Notification,
    ) -> Result<(), MessagePushError>;
}
