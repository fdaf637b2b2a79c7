//! ルームごとのメッセージ履歴
//!
//! 挿入順の有界 FIFO。容量を超えたら先頭（最も古いもの）から捨てる。
//! 読み出しは退避順序に影響しない（LRU ではない）。

use std::collections::VecDeque;

use super::entity::ChatMessage;

/// 履歴の既定容量
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    capacity: usize,
    messages: VecDeque<ChatMessage>,
}

impl HistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            messages: VecDeque::with_capacity(capacity),
        }
    }

    /// 末尾に追加し、容量を超えた分を先頭から退避する
    pub fn append(&mut self, message: ChatMessage) {
        self.messages.push_back(message);
        while self.messages.len() > self.capacity {
            self.messages.pop_front();
        }
    }

    /// 現在の内容を挿入順でコピーして返す
    ///
    /// 返した Vec はバッファと独立しているので、後続の append の影響を受けない。
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.messages.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
