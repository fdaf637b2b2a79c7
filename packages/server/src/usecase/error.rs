//! UseCase 層のエラー定義

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HubError {
    /// ディスパッチャのタスクが終了しており、コマンドを受け付けられない
    #[error("hub dispatcher is not running")]
    Closed,
}
