//! WebSocket connection handlers.
//!
//! 1 本のソケットに対して次の 2 つのタスクを動かす:
//!
//! - 送信タスク（`pusher_loop`）: MessagePusher から届いたフレームと定期的な ping を書き込む
//! - 受信タスク（`receive_loop`）: フレームを `InboundEvent` に変換してディスパッチャへ送る
//!
//! どちらかが終わった時点でソケットの終了とみなす。close フレームを受け取った場合は
//! 明示的な切断、それ以外（エラー・ストリームの終端）はトランスポートの喪失として報告する。

use std::{sync::Arc, time::Duration};

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{
    sink::SinkExt,
    stream::{SplitSink, SplitStream, StreamExt},
};
use serde::Deserialize;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    domain::ResumeToken,
    infrastructure::dto::websocket::{ClientEvent, ServerEvent},
    ui::state::AppState,
    usecase::{Attachment, HubHandle, InboundEvent},
};

/// 無通信の中継機器に切られないよう ping を送る間隔
pub const PING_INTERVAL: Duration = Duration::from_secs(25);

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    /// 再開したいセッションのトークン（前回の `session` イベントで受け取った `resumeToken`）
    pub session: Option<String>,
}

/// ソケットが終了した理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Departure {
    /// close フレームによる明示的な切断
    Closed,
    /// close フレームを伴わない終了（回復ウィンドウの対象）
    Lost,
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConnectQuery>,
) -> impl IntoResponse {
    // 空のトークンは「未知のセッション」と同じく新規接続として扱う
    let resume = query
        .session
        .as_deref()
        .and_then(ResumeToken::parse);
    ws.on_upgrade(move |socket| handle_socket(socket, state, resume))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, resume: Option<ResumeToken>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let attachment = match state.hub.connect(resume, tx).await {
        Ok(attachment) => attachment,
        Err(e) => {
            tracing::error!("Failed to attach socket: {}", e);
            return;
        }
    };

    let (mut sender, receiver) = socket.split();

    // 最初のフレームは session。再開時のバックログは rx 側に溜まっているので、この後に流れる
    let greeting = ServerEvent::from(&attachment);
    let greeted = match serde_json::to_string(&greeting) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to serialize session event: {}", e);
            false
        }
    };
    if !greeted {
        report(&state.hub, &attachment, Departure::Lost);
        return;
    }

    let mut send_task = pusher_loop(rx, sender);
    let mut recv_task = tokio::spawn(receive_loop(
        receiver,
        state.hub.clone(),
        attachment.clone(),
    ));

    // If any one of the tasks completes, abort the other
    let departure = tokio::select! {
        result = &mut recv_task => {
            send_task.abort();
            result.unwrap_or(Departure::Lost)
        }
        _ = &mut send_task => {
            recv_task.abort();
            Departure::Lost
        }
    };

    report(&state.hub, &attachment, departure);
}

fn report(hub: &HubHandle, attachment: &Attachment, departure: Departure) {
    let result = match departure {
        Departure::Closed => hub.disconnect(attachment),
        Departure::Lost => hub.transport_lost(attachment),
    };
    if let Err(e) = result {
        tracing::warn!(
            "Failed to report departure of '{}': {}",
            attachment.connection_id,
            e
        );
    }
}

/// Spawns a task that drains the pusher channel into the WebSocket sink.
///
/// The channel closes when the session is torn down or taken over by a newer
/// socket, which ends this task.
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut sender: SplitSink<WebSocket, Message>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ping = tokio::time::interval(PING_INTERVAL);
        // 最初の tick は即座に完了する
        ping.tick().await;

        loop {
            tokio::select! {
                frame = rx.recv() => {
                    let Some(frame) = frame else { break };
                    if sender.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
                _ = ping.tick() => {
                    if sender.send(Message::Ping(Default::default())).await.is_err() {
                        break;
                    }
                }
            }
        }
    })
}

async fn receive_loop(
    mut receiver: SplitStream<WebSocket>,
    hub: HubHandle,
    attachment: Attachment,
) -> Departure {
    while let Some(frame) = receiver.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("WebSocket error on '{}': {}", attachment.connection_id, e);
                return Departure::Lost;
            }
        };

        let event = match frame {
            Message::Text(text) => {
                tracing::debug!(
                    "Received text from '{}': {}",
                    attachment.connection_id,
                    text.as_str()
                );
                parse_client_frame(text.as_str())
            }
            Message::Binary(_) => InboundEvent::Malformed {
                reason: "binary frames are not supported".to_string(),
            },
            Message::Close(_) => {
                tracing::info!("Client '{}' requested close", attachment.connection_id);
                return Departure::Closed;
            }
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        if hub.dispatch(&attachment, event).is_err() {
            tracing::error!("Hub dispatcher is gone; dropping '{}'", attachment.connection_id);
            return Departure::Lost;
        }
    }

    Departure::Lost
}

/// テキストフレームを解釈する。JSON として不正、または未知の type なら `Malformed`
pub fn parse_client_frame(text: &str) -> InboundEvent {
    match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event.into(),
        Err(e) => InboundEvent::Malformed {
            reason: e.to_string(),
        },
    }
}
