//! UseCase: Connection Lifecycle Manager
//!
//! トランスポート（WebSocket）の再接続を、Hub の単純な connect / disconnect モデルに橋渡しする。
//!
//! ```text
//! connected ──(transport lost, タイマー開始)──▶ recovering ──(ウィンドウ内に再接続)──▶ connected
//!                                                  └──(タイムアウト)──▶ destroyed
//! ```
//!
//! タイマーそのものは dispatcher が起動する。ここでは epoch（世代番号）で
//! 「どのタイマーがまだ有効か」を判定するだけの純粋な状態機械として実装する。
//!
//! セッションの再開には [`ResumeToken`] を使う。接続 ID は他の参加者にも見えるので、
//! 接続 ID を提示しても再開はできない。

use std::{collections::HashMap, time::Duration};

use crate::domain::{ConnectionId, ResumeToken};

/// 1 本のソケットと論理セッションの対応
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub connection_id: ConnectionId,
    /// 本人にだけ渡す再開用トークン（セッションの間は変わらない）
    pub resume_token: ResumeToken,
    /// ソケットごとに払い出す番号。古いソケットからの報告を無視するために使う
    pub socket: u64,
    /// 既存のセッションを再開した場合は `true`
    pub resumed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected { socket: u64 },
    Recovering { epoch: u64 },
}

/// トランスポート喪失の処理結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportLoss {
    /// 回復ウィンドウに入った。`window` 経過後に `epoch` でタイムアウトを報告すること
    Recovering { epoch: u64, window: Duration },
    /// 回復ウィンドウが無効なので即座に破棄した
    Destroyed,
    /// 置き換え済みのソケット、または未知のセッションからの報告
    Ignored,
}

#[derive(Debug)]
struct Session {
    state: SessionState,
    resume_token: ResumeToken,
}

#[derive(Debug)]
pub struct SessionManager {
    sessions: HashMap<ConnectionId, Session>,
    /// 再開トークン → 接続 ID
    tokens: HashMap<ResumeToken, ConnectionId>,
    recovery_window: Duration,
    next_serial: u64,
}

impl SessionManager {
    pub fn new(recovery_window: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            tokens: HashMap::new(),
            recovery_window,
            next_serial: 0,
        }
    }

    /// ソケットをセッションに結び付ける
    ///
    /// `resume` が既知のセッション（回復中、または古いソケットで接続中）のトークンなら
    /// 同じ接続 ID で再開する。未知・期限切れのトークンなら新しいセッションを作る。
    pub fn attach(&mut self, resume: Option<ResumeToken>) -> Attachment {
        let socket = self.next_serial();

        if let Some(connection_id) = resume.and_then(|token| self.tokens.get(&token).cloned())
            && let Some(session) = self.sessions.get_mut(&connection_id)
        {
            session.state = SessionState::Connected { socket };
            return Attachment {
                connection_id,
                resume_token: session.resume_token.clone(),
                socket,
                resumed: true,
            };
        }

        let connection_id = ConnectionId::generate();
        let resume_token = ResumeToken::generate();
        self.tokens.insert(resume_token.clone(), connection_id.clone());
        self.sessions.insert(
            connection_id.clone(),
            Session {
                state: SessionState::Connected { socket },
                resume_token: resume_token.clone(),
            },
        );
        Attachment {
            connection_id,
            resume_token,
            socket,
            resumed: false,
        }
    }

    /// このソケットがセッションの現在のソケットかどうか
    pub fn is_current(&self, attachment: &Attachment) -> bool {
        matches!(
            self.state(&attachment.connection_id),
            Some(SessionState::Connected { socket }) if socket == attachment.socket
        )
    }

    pub fn transport_lost(&mut self, attachment: &Attachment) -> TransportLoss {
        if !self.is_current(attachment) {
            return TransportLoss::Ignored;
        }

        if self.recovery_window.is_zero() {
            self.remove(&attachment.connection_id);
            return TransportLoss::Destroyed;
        }

        let epoch = self.next_serial();
        if let Some(session) = self.sessions.get_mut(&attachment.connection_id) {
            session.state = SessionState::Recovering { epoch };
        }
        TransportLoss::Recovering {
            epoch,
            window: self.recovery_window,
        }
    }

    /// 回復ウィンドウの満了。まだ同じ epoch で回復中なら破棄して `true`
    pub fn expire(&mut self, connection_id: &ConnectionId, epoch: u64) -> bool {
        match self.state(connection_id) {
            Some(SessionState::Recovering { epoch: current }) if current == epoch => {
                self.remove(connection_id);
                true
            }
            _ => false,
        }
    }

    /// クライアントからの明示的な切断（close フレーム）。現在のソケットなら破棄して `true`
    pub fn close(&mut self, attachment: &Attachment) -> bool {
        if !self.is_current(attachment) {
            return false;
        }
        self.remove(&attachment.connection_id);
        true
    }

    pub fn state(&self, connection_id: &ConnectionId) -> Option<SessionState> {
        self.sessions.get(connection_id).map(|session| session.state)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn recovery_window(&self) -> Duration {
        self.recovery_window
    }

    fn remove(&mut self, connection_id: &ConnectionId) {
        if let Some(session) = self.sessions.remove(connection_id) {
            self.tokens.remove(&session.resume_token);
        }
    }

    fn next_serial(&mut self) -> u64 {
        self.next_serial += 1;
        self.next_serial
    }
}
