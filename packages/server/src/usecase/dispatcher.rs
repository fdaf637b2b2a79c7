//! UseCase: イベントディスパッチャ
//!
//! Room Registry・履歴・セッション表を 1 つのタスクが所有し、コマンドを 1 件ずつ処理する。
//! WebSocket ハンドラや HTTP ハンドラは [`HubHandle`] 経由でコマンドを送るだけで、
//! 状態を直接触ることはない。そのためロックは不要。
//!
//! 1 件のコマンドの処理が失敗しても、ループは止まらない（失敗はログに記録するだけ）。

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

use studyhall_shared::time::Clock;

use crate::{
    config::HubConfig,
    domain::{ConnectionId, MessagePusher, PusherChannel, ResumeToken, RoomKey, RoomSummary},
};

use super::{
    error::HubError,
    hub::{BroadcastHub, InboundEvent},
    lifecycle::{Attachment, SessionManager, TransportLoss},
};

/// ディスパッチャが処理するコマンド
#[derive(Debug)]
pub enum HubCommand {
    /// ソケットの接続（`resume` があればセッションの再開を試みる）
    Connect {
        resume: Option<ResumeToken>,
        sender: PusherChannel,
        reply: oneshot::Sender<Attachment>,
    },
    /// クライアントからのイベント
    Inbound {
        attachment: Attachment,
        event: InboundEvent,
    },
    /// close フレームを伴わないソケットの終了
    TransportLost { attachment: Attachment },
    /// close フレームによる明示的な切断
    Disconnect { attachment: Attachment },
    /// 回復ウィンドウの満了（タイマータスクが送る）
    RecoveryExpired {
        connection_id: ConnectionId,
        epoch: u64,
    },
    ListRooms {
        reply: oneshot::Sender<Vec<RoomSummary>>,
    },
    GetRoom {
        room_key: RoomKey,
        reply: oneshot::Sender<Option<RoomSummary>>,
    },
}

/// ディスパッチャへの送信口
///
/// clone して各ハンドラに配る。全ての handle が drop されるとディスパッチャは終了する。
#[derive(Debug, Clone)]
pub struct HubHandle {
    commands: mpsc::UnboundedSender<HubCommand>,
}

impl HubHandle {
    pub async fn connect(
        &self,
        resume: Option<ResumeToken>,
        sender: PusherChannel,
    ) -> Result<Attachment, HubError> {
        let (reply, response) = oneshot::channel();
        self.send(HubCommand::Connect {
            resume,
            sender,
            reply,
        })?;
        response.await.map_err(|_| HubError::Closed)
    }

    pub fn dispatch(&self, attachment: &Attachment, event: InboundEvent) -> Result<(), HubError> {
        self.send(HubCommand::Inbound {
            attachment: attachment.clone(),
            event,
        })
    }

    pub fn transport_lost(&self, attachment: &Attachment) -> Result<(), HubError> {
        self.send(HubCommand::TransportLost {
            attachment: attachment.clone(),
        })
    }

    pub fn disconnect(&self, attachment: &Attachment) -> Result<(), HubError> {
        self.send(HubCommand::Disconnect {
            attachment: attachment.clone(),
        })
    }

    pub async fn rooms(&self) -> Result<Vec<RoomSummary>, HubError> {
        let (reply, response) = oneshot::channel();
        self.send(HubCommand::ListRooms { reply })?;
        response.await.map_err(|_| HubError::Closed)
    }

    pub async fn room(&self, room_key: RoomKey) -> Result<Option<RoomSummary>, HubError> {
        let (reply, response) = oneshot::channel();
        self.send(HubCommand::GetRoom { room_key, reply })?;
        response.await.map_err(|_| HubError::Closed)
    }

    fn send(&self, command: HubCommand) -> Result<(), HubError> {
        self.commands.send(command).map_err(|_| HubError::Closed)
    }
}

/// 状態を所有するディスパッチャ本体
pub struct Dispatcher {
    hub: BroadcastHub,
    sessions: SessionManager,
    message_pusher: Arc<dyn MessagePusher>,
    receiver: mpsc::UnboundedReceiver<HubCommand>,
    /// タイマータスク用。弱参照なので、handle が全て drop されればループは終了できる
    timers: mpsc::WeakUnboundedSender<HubCommand>,
}

impl Dispatcher {
    /// ディスパッチャを起動し、送信口とタスクの JoinHandle を返す
    pub fn spawn(
        config: HubConfig,
        message_pusher: Arc<dyn MessagePusher>,
        clock: Arc<dyn Clock>,
    ) -> (HubHandle, JoinHandle<()>) {
        let (commands, receiver) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher {
            hub: BroadcastHub::new(&config, message_pusher.clone(), clock),
            sessions: SessionManager::new(config.recovery_window),
            message_pusher,
            receiver,
            timers: commands.downgrade(),
        };
        let task = tokio::spawn(dispatcher.run());
        (HubHandle { commands }, task)
    }

    async fn run(mut self) {
        tracing::debug!(
            "Hub dispatcher started (recovery window: {:?})",
            self.sessions.recovery_window()
        );
        while let Some(command) = self.receiver.recv().await {
            self.handle(command).await;
        }
        tracing::debug!("Hub dispatcher stopped");
    }

    async fn handle(&mut self, command: HubCommand) {
        match command {
            HubCommand::Connect {
                resume,
                sender,
                reply,
            } => {
                let requested = resume.is_some();
                let attachment = self.sessions.attach(resume);
                self.message_pusher
                    .register_client(attachment.connection_id.clone(), sender)
                    .await;
                if attachment.resumed {
                    tracing::info!(
                        "Connection '{}' resumed within the recovery window",
                        attachment.connection_id
                    );
                } else {
                    tracing::info!(
                        "Connection '{}' established{}",
                        attachment.connection_id,
                        if requested {
                            " (resume token unknown or expired)"
                        } else {
                            ""
                        }
                    );
                }
                if reply.send(attachment.clone()).is_err() {
                    // ハンドラ側が既に居ない
                    self.teardown(&attachment.connection_id).await;
                    self.sessions.close(&attachment);
                }
            }
            HubCommand::Inbound { attachment, event } => {
                if self.sessions.is_current(&attachment) {
                    self.hub.handle(&attachment.connection_id, event).await;
                } else {
                    tracing::warn!(
                        "Dropped event from superseded socket of '{}'",
                        attachment.connection_id
                    );
                }
            }
            HubCommand::TransportLost { attachment } => {
                match self.sessions.transport_lost(&attachment) {
                    TransportLoss::Recovering { epoch, window } => {
                        tracing::info!(
                            "Connection '{}' lost its transport; recovering for {:?}",
                            attachment.connection_id,
                            window
                        );
                        self.message_pusher
                            .park_client(&attachment.connection_id)
                            .await;
                        self.arm_recovery_timer(attachment.connection_id, epoch, window);
                    }
                    TransportLoss::Destroyed => {
                        tracing::info!("Connection '{}' disconnected", attachment.connection_id);
                        self.teardown(&attachment.connection_id).await;
                    }
                    TransportLoss::Ignored => {
                        tracing::debug!(
                            "Ignored transport loss from superseded socket of '{}'",
                            attachment.connection_id
                        );
                    }
                }
            }
            HubCommand::Disconnect { attachment } => {
                if self.sessions.close(&attachment) {
                    tracing::info!(
                        "Connection '{}' closed by the client",
                        attachment.connection_id
                    );
                    self.teardown(&attachment.connection_id).await;
                }
            }
            HubCommand::RecoveryExpired {
                connection_id,
                epoch,
            } => {
                if self.sessions.expire(&connection_id, epoch) {
                    tracing::info!(
                        "Connection '{}' did not return within the recovery window",
                        connection_id
                    );
                    self.teardown(&connection_id).await;
                }
            }
            HubCommand::ListRooms { reply } => {
                let _ = reply.send(self.hub.summaries());
            }
            HubCommand::GetRoom { room_key, reply } => {
                let _ = reply.send(self.hub.summary(&room_key));
            }
        }
    }

    /// セッションの破棄: Hub から全ルーム退出させ、通知チャンネルを解除する
    async fn teardown(&mut self, connection_id: &ConnectionId) {
        self.hub.on_disconnect(connection_id).await;
        self.message_pusher.unregister_client(connection_id).await;
    }

    fn arm_recovery_timer(&self, connection_id: ConnectionId, epoch: u64, window: Duration) {
        let timers = self.timers.clone();
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            if let Some(commands) = timers.upgrade() {
                let _ = commands.send(HubCommand::RecoveryExpired {
                    connection_id,
                    epoch,
                });
            }
        });
    }
}
