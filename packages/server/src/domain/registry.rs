//! Room Registry
//!
//! ルームキーから [`Room`] への対応を持つ。存在しないルームは「空のルーム」として扱い、
//! join 時に get-or-create で生成する（"room not found" というエラーは存在しない）。

use std::collections::HashMap;

use super::{
    entity::{ChatMessage, Room, RoomSummary},
    value_object::{ConnectionId, RoomKey, Timestamp},
};

/// join 直後のプレゼンス
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceSnapshot {
    /// 今回の join で新たに参加した場合は `true`（既に参加済みなら `false`）
    pub newly_joined: bool,
    /// 参加者一覧（ID 順）
    pub members: Vec<ConnectionId>,
}

#[derive(Debug, Clone)]
pub struct RoomRegistry {
    rooms: HashMap<RoomKey, Room>,
    history_capacity: usize,
}

impl RoomRegistry {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            rooms: HashMap::new(),
            history_capacity,
        }
    }

    /// ルームを取得し、無ければ空の履歴で作成する
    pub fn get_or_create(&mut self, room_key: &RoomKey, now: Timestamp) -> &mut Room {
        let capacity = self.history_capacity;
        self.rooms.entry(room_key.clone()).or_insert_with(|| {
            tracing::debug!("Room '{}' created", room_key);
            Room::new(room_key.clone(), now, capacity)
        })
    }

    /// 冪等: 既に参加済みでもプレゼンスの件数は変わらない
    pub fn join(
        &mut self,
        connection_id: &ConnectionId,
        room_key: &RoomKey,
        now: Timestamp,
    ) -> PresenceSnapshot {
        let room = self.get_or_create(room_key, now);
        let newly_joined = room.join(connection_id.clone());
        PresenceSnapshot {
            newly_joined,
            members: room.members(),
        }
    }

    /// 冪等: 参加していなければ何もしない。参加していた場合は `true`
    pub fn leave(&mut self, connection_id: &ConnectionId, room_key: &RoomKey) -> bool {
        self.rooms
            .get_mut(room_key)
            .is_some_and(|room| room.leave(connection_id))
    }

    /// 指定した接続を全ルームから外し、外したルームのキーを返す（キー順）
    pub fn leave_all(&mut self, connection_id: &ConnectionId) -> Vec<RoomKey> {
        let mut left: Vec<RoomKey> = self
            .rooms
            .values_mut()
            .filter_map(|room| room.leave(connection_id).then(|| room.key.clone()))
            .collect();
        left.sort();
        left
    }

    pub fn presence_count(&self, room_key: &RoomKey) -> usize {
        self.rooms
            .get(room_key)
            .map(Room::presence_count)
            .unwrap_or(0)
    }

    /// 指定した接続以外の参加者
    pub fn others(&self, room_key: &RoomKey, exclude: &ConnectionId) -> Vec<ConnectionId> {
        self.rooms
            .get(room_key)
            .map(|room| room.others(exclude))
            .unwrap_or_default()
    }

    /// 接続が参加しているルーム（キー順）
    pub fn rooms_of(&self, connection_id: &ConnectionId) -> Vec<RoomKey> {
        let mut keys: Vec<RoomKey> = self
            .rooms
            .values()
            .filter(|room| room.contains(connection_id))
            .map(|room| room.key.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn append_message(&mut self, room_key: &RoomKey, message: ChatMessage, now: Timestamp) {
        self.get_or_create(room_key, now).append_message(message);
    }

    /// 履歴のスナップショット（存在しないルームは空）
    pub fn history(&self, room_key: &RoomKey) -> Vec<ChatMessage> {
        self.rooms
            .get(room_key)
            .map(Room::history)
            .unwrap_or_default()
    }

    pub fn summaries(&self) -> Vec<RoomSummary> {
        let mut summaries: Vec<RoomSummary> = self.rooms.values().map(Room::summary).collect();
        summaries.sort_by(|a, b| a.key.cmp(&b.key));
        summaries
    }

    pub fn summary(&self, room_key: &RoomKey) -> Option<RoomSummary> {
        self.rooms.get(room_key).map(Room::summary)
    }
}
