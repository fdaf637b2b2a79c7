//! ドメイン層のエラー定義

use thiserror::Error;

/// 値オブジェクトの生成に失敗した場合のエラー
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValueObjectError {
    /// 接続 ID が空
    #[error("connection id must not be empty")]
    EmptyConnectionId,

    /// メッセージ送信時にルームキーが指定されていない
    #[error("roomKey is required")]
    MissingRoomKey,

    /// メッセージ本文が指定されていない
    #[error("body is required")]
    MissingBody,
}

/// メッセージ通知（push）に失敗した場合のエラー
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MessagePushError {
    /// 通知先のクライアントが登録されていない
    #[error("Client '{0}' not found")]
    ClientNotFound(String),

    /// チャンネルへの送信に失敗
    #[error("Failed to push message: {0}")]
    PushFailed(String),
}
