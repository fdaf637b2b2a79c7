//! UseCase 層
//!
//! - `hub`: ルームへの join / leave / message / disconnect の処理
//! - `lifecycle`: ソケットの切断と再接続を吸収するセッション表
//! - `dispatcher`: 上の 2 つを所有し、コマンドを 1 件ずつ処理するタスク

pub mod dispatcher;
pub mod error;
pub mod hub;
pub mod lifecycle;

pub use dispatcher::{Dispatcher, HubCommand, HubHandle};
pub use error::HubError;
pub use hub::{BroadcastHub, InboundEvent, MessageDraft};
pub use lifecycle::{Attachment, SessionManager, SessionState, TransportLoss};
