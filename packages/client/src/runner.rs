//! Client execution logic with reconnection support.

use rustyline::{DefaultEditor, error::ReadlineError};
use tokio::sync::mpsc;

use crate::{
    config::ClientConfig,
    domain::{should_attempt_reconnect, should_exit_immediately},
    error::ClientError,
    session::run_client_session,
    synchronizer::Synchronizer,
};

/// Run the study-room client with reconnection logic
///
/// 接続に失敗し続けた場合は `max_reconnect_attempts` 回で諦め、エラーを返す。
/// 一度接続できたセッションが切れた場合は、失敗回数を数え直す。
pub async fn run_client(config: ClientConfig) -> Result<(), ClientError> {
    let mut sync = Synchronizer::new(config.name.clone(), config.pending_timeout);
    for room in &config.rooms {
        sync.join_room(room);
    }

    let mut input_rx = spawn_readline(config.name.clone());
    let mut failed_attempts = 0;

    loop {
        tracing::info!(
            "Attempting to connect to {} as '{}' (attempt {}/{})",
            config.url,
            sync.name(),
            failed_attempts + 1,
            config.max_reconnect_attempts
        );

        match run_client_session(&config, &mut sync, &mut input_rx).await {
            Ok(()) => {
                tracing::info!("Client session ended normally");
                return Ok(());
            }
            Err(e) => {
                if matches!(e, ClientError::ConnectionLost) {
                    failed_attempts = 0;
                } else {
                    failed_attempts += 1;
                }
                tracing::warn!("{}", e);
                sync.record_error(e.to_string());

                if should_exit_immediately(&e) {
                    tracing::error!("{}. Exiting.", e);
                    return Err(e);
                }
                if !should_attempt_reconnect(&e, failed_attempts, config.max_reconnect_attempts) {
                    tracing::error!(
                        "Failed to reconnect after {} attempts. Exiting.",
                        config.max_reconnect_attempts
                    );
                    return Err(ClientError::ReconnectExhausted(
                        config.max_reconnect_attempts,
                    ));
                }

                tracing::info!(
                    "Reconnecting in {:?}... (attempt {}/{})",
                    config.reconnect_interval,
                    failed_attempts + 1,
                    config.max_reconnect_attempts
                );
                tokio::time::sleep(config.reconnect_interval).await;
            }
        }
    }
}

/// rustyline は同期 API なので専用スレッドで読み、行をチャンネルに流す
///
/// Ctrl+C / Ctrl+D でスレッドが終わると送信側が drop され、セッションは終了する。
fn spawn_readline(label: String) -> mpsc::UnboundedReceiver<String> {
    let (input_tx, input_rx) = mpsc::unbounded_channel::<String>();

    std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("Failed to initialize readline: {}", e);
                return;
            }
        };

        let prompt = format!("{}> ", label);

        loop {
            match rl.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        rl.add_history_entry(line).ok();
                        if input_tx.send(line.to_string()).is_err() {
                            // Channel closed, exit thread
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    // Ctrl+C
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    // Ctrl+D
                    tracing::info!("EOF");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    });

    input_rx
}
