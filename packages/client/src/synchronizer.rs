//! Client Synchronizer
//!
//! 楽観的に表示した送信メッセージと、サーバーが確定したメッセージを突き合わせる。
//! I/O は持たず、受け取ったイベントから状態を更新し、画面に出すべき内容（[`SyncEvent`]）と
//! サーバーへ送るべきイベント（[`ClientEvent`]）を返すだけ。
//!
//! ## 送信メッセージの状態遷移
//!
//! ```text
//! Pending ──(ack / 同じ ID の message)──▶ Confirmed
//!         ──(同じ clientId の履歴)────────▶ Confirmed（ack を取りこぼした場合）
//!         ──(clientId 付きの error)──────▶ 削除（Failed）
//!         ──(タイムアウト)────────────────▶ 削除（Failed）
//! ```
//!
//! 失敗したメッセージは自動で再送しない。

use std::{
    collections::{BTreeMap, BTreeSet},
    time::Duration,
};

use studyhall_server::{
    domain::RoomKey,
    infrastructure::dto::websocket::{ClientEvent, MessageDto, ServerEvent},
};
use studyhall_shared::time::{parse_rfc3339, timestamp_to_rfc3339};
use uuid::Uuid;

/// ローカル ID の接頭辞
pub const LOCAL_ID_PREFIX: &str = "local-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    /// 送信済み・未確定（`since` は送信時刻）
    Pending { since: i64 },
    /// サーバーが ID を付与した確定済みメッセージ
    Confirmed,
    /// 参加・退出などのお知らせ（ローカルのみ）
    System,
}

/// タイムラインの 1 行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// 確定済みならサーバーの ID、未確定ならローカル ID
    pub id: String,
    pub sender: String,
    pub body: String,
    pub timestamp: i64,
    pub state: DeliveryState,
}

impl Entry {
    fn confirmed(message: MessageDto) -> Self {
        Self {
            timestamp: parse_rfc3339(&message.timestamp).unwrap_or_default(),
            id: message.id,
            sender: message.sender,
            body: message.body,
            state: DeliveryState::Confirmed,
        }
    }

    fn system(body: String, timestamp: i64) -> Self {
        Self {
            id: format!("system-{}", Uuid::new_v4()),
            sender: String::new(),
            body,
            timestamp,
            state: DeliveryState::System,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, DeliveryState::Pending { .. })
    }
}

/// 1 ルーム分の表示状態
#[derive(Debug, Clone, Default)]
pub struct RoomTimeline {
    entries: Vec<Entry>,
    active_users: BTreeSet<String>,
}

impl RoomTimeline {
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn active_users(&self) -> &BTreeSet<String> {
        &self.active_users
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id == id)
    }

    /// 同じ ID があれば置き換え、無ければ末尾に追加する。追加した場合は `true`
    fn upsert(&mut self, entry: Entry) -> bool {
        match self.position(&entry.id) {
            Some(index) => {
                self.entries[index] = entry;
                false
            }
            None => {
                self.entries.push(entry);
                true
            }
        }
    }

    /// 履歴のリプレイ: サーバーの履歴を先頭に、まだ確定していないローカルの送信を後ろに並べる
    ///
    /// 履歴に自分の clientId が載っている Pending は、ack を取りこぼしただけなので
    /// 履歴側の確定済みメッセージに置き換わる。
    fn merge_history(&mut self, messages: Vec<MessageDto>) {
        let mut merged: Vec<Entry> = Vec::with_capacity(messages.len());
        let mut delivered: BTreeSet<String> = BTreeSet::new();
        for message in messages {
            if let Some(client_id) = &message.client_id {
                delivered.insert(client_id.clone());
            }
            let entry = Entry::confirmed(message);
            if !merged.iter().any(|existing| existing.id == entry.id) {
                merged.push(entry);
            }
        }
        merged.extend(
            self.entries
                .drain(..)
                .filter(|entry| entry.is_pending() && !delivered.contains(&entry.id)),
        );
        self.entries = merged;
    }
}

/// 画面に反映すべき変化
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Connected {
        connection_id: String,
        resumed: bool,
    },
    History {
        room: String,
        entries: Vec<Entry>,
    },
    Presence {
        room: String,
        users: Vec<String>,
    },
    /// 他の参加者からの新しいメッセージ
    Received { room: String, entry: Entry },
    /// 自分の送信が確定した
    Confirmed { room: String, entry: Entry },
    /// 自分の送信が失敗した（`body` は失敗したメッセージの本文）
    Failed {
        reason: String,
        body: Option<String>,
    },
    UserJoined {
        room: String,
        connection_id: String,
        at: i64,
    },
    UserLeft {
        room: String,
        connection_id: String,
        at: i64,
    },
}

#[derive(Debug)]
pub struct Synchronizer {
    name: String,
    rooms: BTreeMap<String, RoomTimeline>,
    focus: Option<String>,
    connection_id: Option<String>,
    resume_token: Option<String>,
    last_error: Option<String>,
    pending_timeout: Duration,
}

impl Synchronizer {
    pub fn new(name: impl Into<String>, pending_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            rooms: BTreeMap::new(),
            focus: None,
            connection_id: None,
            resume_token: None,
            last_error: None,
            pending_timeout,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// 他の参加者からも見える自分の接続 ID
    pub fn connection_id(&self) -> Option<&str> {
        self.connection_id.as_deref()
    }

    /// 再接続時に `?session=` として提示する再開トークン
    pub fn resume_token(&self) -> Option<&str> {
        self.resume_token.as_deref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// 接続エラーなど、同期の外で起きた失敗を記録する
    pub fn record_error(&mut self, error: impl Into<String>) {
        self.last_error = Some(error.into());
    }

    pub fn focused_room(&self) -> Option<&str> {
        self.focus.as_deref()
    }

    /// 参加中のルームを送信先にする。参加していなければ `false`
    pub fn focus(&mut self, room: &str) -> bool {
        if self.rooms.contains_key(room) {
            self.focus = Some(room.to_string());
            true
        } else {
            false
        }
    }

    pub fn active_rooms(&self) -> Vec<String> {
        self.rooms.keys().cloned().collect()
    }

    pub fn timeline(&self, room: &str) -> Option<&RoomTimeline> {
        self.rooms.get(room)
    }

    pub fn pending_count(&self) -> usize {
        self.rooms
            .values()
            .flat_map(|timeline| timeline.entries.iter())
            .filter(|entry| entry.is_pending())
            .count()
    }

    /// ルームに参加し、送信先にする
    pub fn join_room(&mut self, room: &str) -> ClientEvent {
        let room = normalize_room(room);
        self.rooms.entry(room.clone()).or_default();
        self.focus = Some(room.clone());
        ClientEvent::Join {
            room_key: Some(room),
        }
    }

    /// ルームから退出し、そのタイムラインを破棄する。参加していなければ `None`
    pub fn leave_room(&mut self, room: &str) -> Option<ClientEvent> {
        let room = normalize_room(room);
        self.rooms.remove(&room)?;
        if self.focus.as_deref() == Some(room.as_str()) {
            self.focus = self.rooms.keys().next().cloned();
        }
        Some(ClientEvent::Leave {
            room_key: Some(room),
        })
    }

    /// 送信するメッセージを作成し、Pending として即座にタイムラインへ追加する
    ///
    /// 送信先のルームが無い、または本文が空なら `None`
    pub fn compose(&mut self, body: &str, now: i64) -> Option<ClientEvent> {
        let body = body.trim();
        if body.is_empty() {
            return None;
        }
        let room = self.focus.clone()?;
        let timeline = self.rooms.get_mut(&room)?;

        let local_id = format!("{}{}", LOCAL_ID_PREFIX, Uuid::new_v4());
        timeline.entries.push(Entry {
            id: local_id.clone(),
            sender: self.name.clone(),
            body: body.to_string(),
            timestamp: now,
            state: DeliveryState::Pending { since: now },
        });

        Some(ClientEvent::Message {
            room_key: Some(room),
            sender: Some(self.name.clone()),
            body: Some(body.to_string()),
            timestamp: Some(timestamp_to_rfc3339(now)),
            client_id: Some(local_id),
        })
    }

    /// 接続（再接続）の確立。参加中の全ルームに join し直すイベントを返す
    pub fn on_connected(
        &mut self,
        connection_id: String,
        resume_token: String,
        resumed: bool,
    ) -> (SyncEvent, Vec<ClientEvent>) {
        self.connection_id = Some(connection_id.clone());
        self.resume_token = Some(resume_token);
        self.last_error = None;
        let joins = self
            .rooms
            .keys()
            .map(|room| ClientEvent::Join {
                room_key: Some(room.clone()),
            })
            .collect();
        (
            SyncEvent::Connected {
                connection_id,
                resumed,
            },
            joins,
        )
    }

    /// サーバーからのイベントを反映する。画面に出すものが無ければ `None`
    pub fn apply(&mut self, event: ServerEvent, now: i64) -> Option<SyncEvent> {
        match event {
            ServerEvent::Session { .. } => None,
            ServerEvent::History { room_key, messages } => {
                let timeline = self.rooms.get_mut(&room_key)?;
                timeline.merge_history(messages);
                Some(SyncEvent::History {
                    entries: timeline.entries.clone(),
                    room: room_key,
                })
            }
            ServerEvent::Presence {
                room_key,
                connection_ids,
            } => {
                let timeline = self.rooms.get_mut(&room_key)?;
                timeline.active_users = connection_ids.iter().cloned().collect();
                Some(SyncEvent::Presence {
                    room: room_key,
                    users: connection_ids,
                })
            }
            ServerEvent::Message { room_key, message } => {
                let timeline = self.rooms.get_mut(&room_key)?;
                let entry = Entry::confirmed(message);
                // 同じ ID は置き換えるだけで、二重に表示しない
                timeline.upsert(entry.clone()).then_some(SyncEvent::Received {
                    room: room_key,
                    entry,
                })
            }
            ServerEvent::Ack {
                room_key,
                client_id,
                message,
            } => {
                let timeline = self.rooms.get_mut(&room_key)?;
                let entry = Entry::confirmed(message);
                let pending = client_id
                    .as_deref()
                    .and_then(|local_id| timeline.position(local_id));
                match pending {
                    Some(index) => {
                        // 楽観的に表示していた位置をそのまま確定版に置き換える
                        timeline.entries[index] = entry.clone();
                        if let Some(duplicate) = timeline
                            .entries
                            .iter()
                            .enumerate()
                            .position(|(i, e)| i != index && e.id == entry.id)
                        {
                            timeline.entries.remove(duplicate);
                        }
                    }
                    None => {
                        timeline.upsert(entry.clone());
                    }
                }
                Some(SyncEvent::Confirmed {
                    room: room_key,
                    entry,
                })
            }
            ServerEvent::Error { message, client_id } => {
                let body = client_id.and_then(|local_id| self.remove_pending(&local_id));
                self.last_error = Some(message.clone());
                Some(SyncEvent::Failed {
                    reason: message,
                    body,
                })
            }
            ServerEvent::UserJoined {
                room_key,
                connection_id,
                timestamp,
            } => {
                let timeline = self.rooms.get_mut(&room_key)?;
                let at = parse_rfc3339(&timestamp).unwrap_or(now);
                timeline.active_users.insert(connection_id.clone());
                timeline
                    .entries
                    .push(Entry::system(format!("{} joined", connection_id), at));
                Some(SyncEvent::UserJoined {
                    room: room_key,
                    connection_id,
                    at,
                })
            }
            ServerEvent::UserLeft {
                room_key,
                connection_id,
                timestamp,
            } => {
                let timeline = self.rooms.get_mut(&room_key)?;
                let at = parse_rfc3339(&timestamp).unwrap_or(now);
                timeline.active_users.remove(&connection_id);
                timeline
                    .entries
                    .push(Entry::system(format!("{} left", connection_id), at));
                Some(SyncEvent::UserLeft {
                    room: room_key,
                    connection_id,
                    at,
                })
            }
        }
    }

    /// タイムアウトした Pending を失敗として取り除く
    pub fn expire_pending(&mut self, now: i64) -> Vec<SyncEvent> {
        let timeout = i64::try_from(self.pending_timeout.as_millis()).unwrap_or(i64::MAX);
        let mut failed = Vec::new();
        for timeline in self.rooms.values_mut() {
            timeline.entries.retain(|entry| match entry.state {
                DeliveryState::Pending { since } if now.saturating_sub(since) >= timeout => {
                    failed.push(SyncEvent::Failed {
                        reason: "Message was not acknowledged in time".to_string(),
                        body: Some(entry.body.clone()),
                    });
                    false
                }
                _ => true,
            });
        }
        if !failed.is_empty() {
            self.last_error = Some("Message was not acknowledged in time".to_string());
        }
        failed
    }

    fn remove_pending(&mut self, local_id: &str) -> Option<String> {
        self.rooms.values_mut().find_map(|timeline| {
            let index = timeline
                .entries
                .iter()
                .position(|entry| entry.id == local_id && entry.is_pending())?;
            Some(timeline.entries.remove(index).body)
        })
    }
}

/// サーバーと同じ規則（前後の空白を除去、空なら `default`、長すぎれば切り詰め）でルームキーを揃える
fn normalize_room(room: &str) -> String {
    RoomKey::or_default(Some(room)).into_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - compose した Pending が ack で同じ位置の Confirmed に置き換わること（二重表示しない）
    // - clientId 付きの error で Pending が消えること
    // - 再接続時の join の再送と、履歴のマージ
    // - ack を取りこぼしても、履歴の clientId で Pending が確定すること
    // - 長いルームキーがサーバーと同じ長さに切り詰められること
    // - Pending のタイムアウト
    // ========================================

    const NOW: i64 = 1_700_000_000_000;
    const TIMEOUT: Duration = Duration::from_secs(10);

    fn joined(room: &str) -> Synchronizer {
        let mut sync = Synchronizer::new("alice", TIMEOUT);
        sync.join_room(room);
        sync
    }

    fn dto(id: &str, body: &str) -> MessageDto {
        MessageDto {
            id: id.to_string(),
            sender: "alice".to_string(),
            body: body.to_string(),
            timestamp: timestamp_to_rfc3339(NOW),
            client_id: None,
        }
    }

    fn local_id(event: &ClientEvent) -> String {
        match event {
            ClientEvent::Message { client_id, .. } => client_id.clone().unwrap(),
            other => panic!("expected message event, got {:?}", other),
        }
    }

    fn ids(sync: &Synchronizer, room: &str) -> Vec<String> {
        sync.timeline(room)
            .unwrap()
            .entries()
            .iter()
            .map(|entry| entry.id.clone())
            .collect()
    }

    #[test]
    fn test_compose_inserts_pending_entry() {
        // テスト項目: 送信したメッセージは即座に Pending として表示され、clientId 付きで送られる
        // given (前提条件):
        let mut sync = joined("study-1");

        // when (操作):
        let event = sync.compose("  hello  ", NOW).unwrap();

        // then (期待する結果):
        let id = local_id(&event);
        assert!(id.starts_with(LOCAL_ID_PREFIX));
        let entries = sync.timeline("study-1").unwrap().entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].body, "hello");
        assert_eq!(entries[0].state, DeliveryState::Pending { since: NOW });
        assert!(matches!(
            event,
            ClientEvent::Message { room_key: Some(ref room), .. } if room == "study-1"
        ));
    }

    #[test]
    fn test_compose_without_room_or_body_is_ignored() {
        // テスト項目: 参加中のルームが無い、または本文が空なら何も送らない
        // given (前提条件):
        let mut without_room = Synchronizer::new("alice", TIMEOUT);
        let mut with_room = joined("study-1");

        // when (操作):
        let no_room = without_room.compose("hello", NOW);
        let blank = with_room.compose("   ", NOW);

        // then (期待する結果):
        assert!(no_room.is_none());
        assert!(blank.is_none());
        assert_eq!(with_room.pending_count(), 0);
    }

    #[test]
    fn test_ack_replaces_pending_in_place() {
        // テスト項目: L1 を送って S1 の ack を受けると、同じ位置で 1 件だけの確定済みメッセージになる
        // given (前提条件):
        let mut sync = joined("study-1");
        let l1 = local_id(&sync.compose("first", NOW).unwrap());
        sync.compose("second", NOW);

        // when (操作):
        let event = sync.apply(
            ServerEvent::Ack {
                room_key: "study-1".to_string(),
                client_id: Some(l1),
                message: dto("S1", "first"),
            },
            NOW,
        );

        // then (期待する結果):
        assert!(matches!(event, Some(SyncEvent::Confirmed { .. })));
        let entries = sync.timeline("study-1").unwrap().entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "S1");
        assert_eq!(entries[0].state, DeliveryState::Confirmed);
        assert!(entries[1].is_pending());
    }

    #[test]
    fn test_duplicate_message_is_not_shown_twice() {
        // テスト項目: 既に確定済みの ID の message が届いても二重に表示しない
        // given (前提条件):
        let mut sync = joined("study-1");
        let l1 = local_id(&sync.compose("first", NOW).unwrap());
        sync.apply(
            ServerEvent::Ack {
                room_key: "study-1".to_string(),
                client_id: Some(l1.clone()),
                message: dto("S1", "first"),
            },
            NOW,
        );

        // when (操作):
        let echoed = sync.apply(
            ServerEvent::Message {
                room_key: "study-1".to_string(),
                message: dto("S1", "first"),
            },
            NOW,
        );
        let replayed_ack = sync.apply(
            ServerEvent::Ack {
                room_key: "study-1".to_string(),
                client_id: Some(l1),
                message: dto("S1", "first"),
            },
            NOW,
        );

        // then (期待する結果):
        assert!(echoed.is_none());
        assert!(replayed_ack.is_some());
        assert_eq!(ids(&sync, "study-1"), vec!["S1".to_string()]);
    }

    #[test]
    fn test_message_from_other_member_is_appended() {
        // テスト項目: 他の参加者のメッセージは確定済みとして末尾に追加される
        // given (前提条件):
        let mut sync = joined("study-1");

        // when (操作):
        let event = sync.apply(
            ServerEvent::Message {
                room_key: "study-1".to_string(),
                message: dto("S9", "from bob"),
            },
            NOW,
        );

        // then (期待する結果):
        assert!(matches!(
            event,
            Some(SyncEvent::Received { ref entry, .. }) if entry.body == "from bob"
        ));
        assert_eq!(ids(&sync, "study-1"), vec!["S9".to_string()]);
    }

    #[test]
    fn test_error_with_client_id_removes_pending() {
        // テスト項目: clientId 付きの error を受けると該当の Pending が消え、エラー状態になる
        // given (前提条件):
        let mut sync = joined("study-1");
        let l1 = local_id(&sync.compose("rejected", NOW).unwrap());

        // when (操作):
        let event = sync.apply(
            ServerEvent::Error {
                message: "Invalid message format".to_string(),
                client_id: Some(l1),
            },
            NOW,
        );

        // then (期待する結果):
        assert_eq!(
            event,
            Some(SyncEvent::Failed {
                reason: "Invalid message format".to_string(),
                body: Some("rejected".to_string()),
            })
        );
        assert_eq!(sync.pending_count(), 0);
        assert_eq!(sync.last_error(), Some("Invalid message format"));
    }

    #[test]
    fn test_reconnect_rejoins_every_active_room() {
        // テスト項目: 接続（再接続）時に参加中の全ルームへ join が再送される
        // given (前提条件):
        let mut sync = joined("math");
        sync.join_room("physics");
        sync.record_error("Connection lost");

        // when (操作):
        let (event, joins) = sync.on_connected("c-1".to_string(), "t-1".to_string(), false);

        // then (期待する結果):
        assert_eq!(
            event,
            SyncEvent::Connected {
                connection_id: "c-1".to_string(),
                resumed: false
            }
        );
        assert_eq!(
            joins,
            vec![
                ClientEvent::Join {
                    room_key: Some("math".to_string())
                },
                ClientEvent::Join {
                    room_key: Some("physics".to_string())
                },
            ]
        );
        assert_eq!(sync.connection_id(), Some("c-1"));
        assert_eq!(sync.resume_token(), Some("t-1"));
        assert!(sync.last_error().is_none());
    }

    #[test]
    fn test_history_merge_puts_server_history_before_pending() {
        // テスト項目: 履歴のリプレイはサーバーの履歴を先に、未確定のローカル送信を後ろに並べる
        // given (前提条件):
        let mut sync = joined("study-1");
        sync.apply(
            ServerEvent::Message {
                room_key: "study-1".to_string(),
                message: dto("S1", "old"),
            },
            NOW,
        );
        let pending = local_id(&sync.compose("in flight", NOW).unwrap());

        // when (操作):
        let event = sync.apply(
            ServerEvent::History {
                room_key: "study-1".to_string(),
                messages: vec![dto("S1", "old"), dto("S2", "new")],
            },
            NOW,
        );

        // then (期待する結果):
        assert!(matches!(
            event,
            Some(SyncEvent::History { ref entries, .. }) if entries.len() == 3
        ));
        assert_eq!(
            ids(&sync, "study-1"),
            vec!["S1".to_string(), "S2".to_string(), pending]
        );
    }

    #[test]
    fn test_history_with_own_client_id_confirms_pending_after_lost_ack() {
        // テスト項目: ack を取りこぼした送信は、履歴に同じ clientId があれば確定済みとして 1 件だけ残る
        // given (前提条件):
        let mut sync = joined("study-1");
        let l1 = local_id(&sync.compose("sent before drop", NOW).unwrap());
        let replayed = MessageDto {
            client_id: Some(l1.clone()),
            ..dto("S1", "sent before drop")
        };

        // when (操作):
        sync.apply(
            ServerEvent::History {
                room_key: "study-1".to_string(),
                messages: vec![replayed],
            },
            NOW,
        );
        let failed = sync.expire_pending(NOW + 60_000);

        // then (期待する結果):
        assert_eq!(ids(&sync, "study-1"), vec!["S1".to_string()]);
        assert_eq!(
            sync.timeline("study-1").unwrap().entries()[0].state,
            DeliveryState::Confirmed
        );
        assert_eq!(sync.pending_count(), 0);
        assert!(failed.is_empty());
    }

    #[test]
    fn test_long_room_key_is_truncated_like_server() {
        // テスト項目: 64 文字を超えるルームキーはサーバーと同じく切り詰められ、ack と突き合わせられる
        // given (前提条件):
        let long_room = "r".repeat(80);
        let stored_room = "r".repeat(64);
        let mut sync = Synchronizer::new("alice", TIMEOUT);
        let join = sync.join_room(&long_room);
        let l1 = local_id(&sync.compose("hello", NOW).unwrap());

        // when (操作):
        let event = sync.apply(
            ServerEvent::Ack {
                room_key: stored_room.clone(),
                client_id: Some(l1),
                message: dto("S1", "hello"),
            },
            NOW,
        );

        // then (期待する結果):
        assert_eq!(
            join,
            ClientEvent::Join {
                room_key: Some(stored_room.clone())
            }
        );
        assert_eq!(sync.active_rooms(), vec![stored_room.clone()]);
        assert!(matches!(event, Some(SyncEvent::Confirmed { .. })));
        assert_eq!(ids(&sync, &stored_room), vec!["S1".to_string()]);
        assert_eq!(sync.pending_count(), 0);
    }

    #[test]
    fn test_pending_expires_after_timeout() {
        // テスト項目: タイムアウトまでに確定しなかった Pending は失敗として取り除かれる
        // given (前提条件):
        let mut sync = joined("study-1");
        sync.compose("lost in transit", NOW);

        // when (操作):
        let early = sync.expire_pending(NOW + 9_999);
        let late = sync.expire_pending(NOW + 10_000);

        // then (期待する結果):
        assert!(early.is_empty());
        assert_eq!(late.len(), 1);
        assert!(matches!(
            &late[0],
            SyncEvent::Failed { body: Some(body), .. } if body == "lost in transit"
        ));
        assert_eq!(sync.pending_count(), 0);
    }

    #[test]
    fn test_presence_and_membership_notices() {
        // テスト項目: presence で参加者一覧が初期化され、userJoined / userLeft で更新される
        // given (前提条件):
        let mut sync = joined("study-1");
        sync.apply(
            ServerEvent::Presence {
                room_key: "study-1".to_string(),
                connection_ids: vec!["me".to_string(), "bob".to_string()],
            },
            NOW,
        );

        // when (操作):
        sync.apply(
            ServerEvent::UserJoined {
                room_key: "study-1".to_string(),
                connection_id: "carol".to_string(),
                timestamp: timestamp_to_rfc3339(NOW),
            },
            NOW,
        );
        sync.apply(
            ServerEvent::UserLeft {
                room_key: "study-1".to_string(),
                connection_id: "bob".to_string(),
                timestamp: timestamp_to_rfc3339(NOW),
            },
            NOW,
        );

        // then (期待する結果):
        let timeline = sync.timeline("study-1").unwrap();
        let users: Vec<&str> = timeline.active_users().iter().map(String::as_str).collect();
        assert_eq!(users, vec!["carol", "me"]);
        let notices: Vec<&str> = timeline
            .entries()
            .iter()
            .filter(|entry| entry.state == DeliveryState::System)
            .map(|entry| entry.body.as_str())
            .collect();
        assert_eq!(notices, vec!["carol joined", "bob left"]);
    }

    #[test]
    fn test_leave_room_drops_timeline() {
        // テスト項目: 退出したルームのタイムラインは破棄され、以降のイベントは無視される
        // given (前提条件):
        let mut sync = joined("math");
        sync.join_room("physics");

        // when (操作):
        let leave = sync.leave_room("physics");
        let ignored = sync.apply(
            ServerEvent::Message {
                room_key: "physics".to_string(),
                message: dto("S1", "late"),
            },
            NOW,
        );
        let second_leave = sync.leave_room("physics");

        // then (期待する結果):
        assert_eq!(
            leave,
            Some(ClientEvent::Leave {
                room_key: Some("physics".to_string())
            })
        );
        assert!(ignored.is_none());
        assert!(second_leave.is_none());
        assert_eq!(sync.active_rooms(), vec!["math".to_string()]);
        assert_eq!(sync.focused_room(), Some("math"));
    }
}
