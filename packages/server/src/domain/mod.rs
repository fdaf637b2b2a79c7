//! ドメイン層
//!
//! ルーム、プレゼンス、メッセージ履歴といったビジネスルールを表現します。
//! I/O には依存せず、外部への通知は `MessagePusher` trait 越しに行います。

pub mod entity;
pub mod error;
pub mod history;
pub mod notification;
pub mod pusher;
pub mod registry;
pub mod value_object;

pub use entity::{ChatMessage, Room, RoomSummary};
pub use error::{MessagePushError, ValueObjectError};
pub use history::{DEFAULT_HISTORY_CAPACITY, HistoryBuffer};
pub use notification::Notification;
pub use pusher::{MessagePusher, PusherChannel};
pub use registry::{PresenceSnapshot, RoomRegistry};
pub use value_object::{
    ANONYMOUS_SENDER, ConnectionId, DEFAULT_ROOM_KEY, MessageBody, MessageId, ResumeToken, RoomKey,
    SenderName, Timestamp,
};

#[cfg(test)]
pub use pusher::MockMessagePusher;
