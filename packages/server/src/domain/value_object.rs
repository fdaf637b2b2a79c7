//! 値オブジェクト
//!
//! クライアントから届く文字列は信頼せず、ここで正規化（トリム・切り詰め・既定値の補完）します。

use std::fmt;

use uuid::Uuid;

use studyhall_shared::time::timestamp_to_rfc3339;

use super::error::ValueObjectError;

/// ルームキーが省略された場合に使うルーム
pub const DEFAULT_ROOM_KEY: &str = "default";

/// 送信者名が空の場合の表示名
pub const ANONYMOUS_SENDER: &str = "Anonymous";

/// ルームキーの最大文字数
pub const MAX_ROOM_KEY_CHARS: usize = 64;

/// 文字単位（バイト単位ではない）で切り詰める
fn truncate_chars(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

/// 接続 ID
///
/// 1 つの論理セッションを識別する、サーバーが払い出す ID。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// 新しい接続 ID を払い出す（UUID v4）
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ValueObjectError::EmptyConnectionId);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for ConnectionId {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// セッション再開用のトークン
///
/// `session` イベントで本人にだけ渡す秘密の値。接続 ID はプレゼンスとして他の参加者に
/// 見えるので、再開の鍵には使わない。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResumeToken(String);

impl ResumeToken {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// 空文字は「トークン無し」として扱う
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// ルームキー
///
/// 不透明な文字列。前後の空白は除去し、64 文字で切り詰める。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomKey(String);

impl RoomKey {
    /// 省略・空文字の場合は `"default"` ルームにフォールバックする（join / leave 用）
    pub fn or_default(value: Option<&str>) -> Self {
        Self::required(value).unwrap_or_else(|_| Self(DEFAULT_ROOM_KEY.to_string()))
    }

    /// 省略・空文字をエラーとして扱う（message 用）
    pub fn required(value: Option<&str>) -> Result<Self, ValueObjectError> {
        let trimmed = value.map(str::trim).unwrap_or_default();
        if trimmed.is_empty() {
            return Err(ValueObjectError::MissingRoomKey);
        }
        Ok(Self(truncate_chars(trimmed, MAX_ROOM_KEY_CHARS)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// メッセージ ID（サーバーが受信時に払い出す）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(String);

impl MessageId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// 送信者の表示名
///
/// クライアントの自己申告なので信頼しない。制御文字を除去し、指定文字数で切り詰め、
/// 空なら `"Anonymous"` とする。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderName(String);

impl SenderName {
    pub fn sanitize(value: Option<&str>, max_chars: usize) -> Self {
        let cleaned: String = value
            .unwrap_or_default()
            .chars()
            .filter(|c| !c.is_control())
            .collect();
        let truncated = truncate_chars(cleaned.trim(), max_chars);
        let name = truncated.trim();
        if name.is_empty() {
            Self(ANONYMOUS_SENDER.to_string())
        } else {
            Self(name.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// メッセージ本文
///
/// 長すぎる本文は拒否せず切り詰める。空白のみの本文はエラー。
/// 前後の空白は本文の一部としてそのまま残す。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBody(String);

impl MessageBody {
    pub fn new(value: Option<&str>, max_chars: usize) -> Result<Self, ValueObjectError> {
        let raw = value.unwrap_or_default();
        if raw.trim().is_empty() {
            return Err(ValueObjectError::MissingBody);
        }
        Ok(Self(truncate_chars(raw, max_chars)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 文字数（バイト数ではない）
    pub fn char_count(&self) -> usize {
        self.0.chars().count()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Unix タイムスタンプ（UTC, ミリ秒）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn to_rfc3339(&self) -> String {
        timestamp_to_rfc3339(self.0)
    }
}
