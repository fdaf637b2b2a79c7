//! WebSocket client session management.
//!
//! 1 回の接続の間、ソケットの受信・ユーザー入力・定期的な tick（Pending のタイムアウト判定）を
//! `tokio::select!` で 1 つのループにまとめて処理する。状態は全て [`Synchronizer`] が持つので、
//! 接続が切れても次のセッションにそのまま引き継がれる。

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use studyhall_server::infrastructure::dto::websocket::{ClientEvent, ServerEvent};
use studyhall_shared::time::get_utc_timestamp;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite, tungstenite::protocol::Message};

use crate::{
    config::ClientConfig,
    domain::Command,
    error::ClientError,
    formatter::MessageFormatter,
    synchronizer::Synchronizer,
    ui::redisplay_prompt,
};

const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// 1 件の入力（フレームまたはコマンド）を処理した結果
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Step {
    /// 画面に出す文字列
    pub output: Vec<String>,
    /// サーバーへ送るイベント
    pub outgoing: Vec<ClientEvent>,
    /// ユーザーが終了を選んだ
    pub quit: bool,
}

/// Run one WebSocket session until the connection ends or the user quits.
///
/// `Ok(())` means the user quit. `Err(ConnectionLost)` means an established
/// connection dropped; any other error means connecting failed.
pub async fn run_client_session(
    config: &ClientConfig,
    sync: &mut Synchronizer,
    input_rx: &mut mpsc::UnboundedReceiver<String>,
) -> Result<(), ClientError> {
    let url = config.connect_url(sync.resume_token());
    let (ws_stream, _response) = connect_async(url.as_str()).await.map_err(|e| match e {
        tungstenite::Error::Url(_) => ClientError::InvalidUrl(config.url.clone()),
        other => ClientError::ConnectionError(other.to_string()),
    })?;

    tracing::info!("Connected to study-room server!");
    println!(
        "\nYou are '{}'. Type messages and press Enter to send. /help lists commands.\n",
        sync.name()
    );

    let (mut write, mut read) = ws_stream.split();
    let mut tick = tokio::time::interval(TICK_INTERVAL);

    loop {
        let step = tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => on_frame(sync, text.as_str(), get_utc_timestamp()),
                Some(Ok(Message::Binary(data))) => {
                    let notice = format!("{} bytes of binary data", data.len());
                    Step {
                        output: vec![MessageFormatter::format_raw_message(&notice)],
                        ..Step::default()
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    tracing::info!("Server closed the connection");
                    return Err(ClientError::ConnectionLost);
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    tracing::warn!("WebSocket read error: {}", e);
                    return Err(ClientError::ConnectionLost);
                }
            },
            line = input_rx.recv() => match line {
                Some(line) => on_command(sync, Command::parse(&line), get_utc_timestamp()),
                // 入力が閉じた（Ctrl+C / Ctrl+D）
                None => Step { quit: true, ..Step::default() },
            },
            _ = tick.tick() => {
                let failed = sync.expire_pending(get_utc_timestamp());
                Step {
                    output: failed
                        .iter()
                        .map(|event| MessageFormatter::format_event(event, sync.connection_id()))
                        .collect(),
                    ..Step::default()
                }
            }
        };

        for event in &step.outgoing {
            let json = match serde_json::to_string(event) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!("Failed to serialize event: {}", e);
                    continue;
                }
            };
            if let Err(e) = write.send(Message::text(json)).await {
                tracing::warn!("Failed to send event: {}", e);
                return Err(ClientError::ConnectionLost);
            }
        }

        if !step.output.is_empty() {
            for text in &step.output {
                print!("{}", text);
            }
            redisplay_prompt(sync.name());
        }

        if step.quit {
            let _ = write.send(Message::Close(None)).await;
            return Ok(());
        }
    }
}

/// サーバーからのテキストフレームを処理する
pub fn on_frame(sync: &mut Synchronizer, text: &str, now: i64) -> Step {
    let event = match serde_json::from_str::<ServerEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!("Unrecognised frame: {}", e);
            return Step {
                output: vec![MessageFormatter::format_raw_message(text)],
                ..Step::default()
            };
        }
    };

    if let ServerEvent::Session {
        connection_id,
        resume_token,
        resumed,
    } = event
    {
        // 参加中の全ルームに join し直す（再開時も履歴のマージのために送る）
        let (connected, joins) = sync.on_connected(connection_id, resume_token, resumed);
        return Step {
            output: vec![MessageFormatter::format_event(&connected, sync.connection_id())],
            outgoing: joins,
            quit: false,
        };
    }

    let output = sync
        .apply(event, now)
        .map(|update| MessageFormatter::format_event(&update, sync.connection_id()))
        .into_iter()
        .collect();
    Step {
        output,
        ..Step::default()
    }
}

/// ユーザーの入力を処理する
pub fn on_command(sync: &mut Synchronizer, command: Command, now: i64) -> Step {
    let mut step = Step::default();
    match command {
        Command::Say(body) => match sync.compose(&body, now) {
            Some(event) => step.outgoing.push(event),
            None if sync.focused_room().is_none() => step
                .output
                .push("\n! Join a room first: /join <room>\n".to_string()),
            None => {}
        },
        Command::Join(room) => step.outgoing.push(sync.join_room(&room)),
        Command::Leave(room) => {
            let room = room.or_else(|| sync.focused_room().map(str::to_string));
            match room.and_then(|room| sync.leave_room(&room)) {
                Some(event) => step.outgoing.push(event),
                None => step.output.push("\n! Not in that room\n".to_string()),
            }
        }
        Command::Focus(room) => {
            if sync.focus(&room) {
                step.output.push(format!("\n* Now sending to #{}\n", room));
            } else {
                step.output.push(format!("\n! Not in #{}; use /join {}\n", room, room));
            }
        }
        Command::ListRooms => {
            let rooms = sync.active_rooms();
            let focused = sync.focused_room();
            let mut listing = String::from("\nJoined rooms:\n");
            for room in &rooms {
                let marker = if Some(room.as_str()) == focused { " (current)" } else { "" };
                listing.push_str(&format!("  #{}{}\n", room, marker));
            }
            step.output.push(listing);
        }
        Command::Rename(name) => {
            sync.set_name(name.clone());
            step.output.push(format!("\n* You are now '{}'\n", name));
        }
        Command::Help => step.output.push(MessageFormatter::format_help()),
        Command::Quit => step.quit = true,
        Command::Unknown(line) => step
            .output
            .push(format!("\n! Unknown command: {} (try /help)\n", line)),
    }
    step
}
