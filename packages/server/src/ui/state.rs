//! Shared application state.

use std::time::Instant;

use crate::usecase::HubHandle;

/// ハンドラ間で共有する状態
///
/// ルームの状態そのものはディスパッチャのタスクが所有しており、ここには送信口しか置かない。
pub struct AppState {
    pub hub: HubHandle,
    /// `/health` の uptime 用
    pub started_at: Instant,
}
