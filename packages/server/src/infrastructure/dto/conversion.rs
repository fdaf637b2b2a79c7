//! Conversion logic between DTOs and domain models.
//!
//! 受信方向は検証しない（`InboundEvent` は未検証の生データ）。検証は Hub が行う。

use crate::{
    domain::{ChatMessage, Notification, RoomSummary},
    infrastructure::dto::{
        http::RoomSummaryDto,
        websocket::{ClientEvent, MessageDto, ServerEvent},
    },
    usecase::{Attachment, InboundEvent, MessageDraft},
};

// ========================================
// DTO → UseCase / Domain
// ========================================

impl From<ClientEvent> for InboundEvent {
    fn from(dto: ClientEvent) -> Self {
        match dto {
            ClientEvent::Join { room_key } => InboundEvent::Join { room_key },
            ClientEvent::Leave { room_key } => InboundEvent::Leave { room_key },
            ClientEvent::Message {
                room_key,
                sender,
                body,
                timestamp,
                client_id,
            } => InboundEvent::Message(MessageDraft {
                room_key,
                sender,
                body,
                timestamp,
                client_id,
            }),
        }
    }
}

// ========================================
// Domain → DTO
// ========================================

impl From<ChatMessage> for MessageDto {
    fn from(model: ChatMessage) -> Self {
        Self {
            id: model.id.into_string(),
            sender: model.sender.into_string(),
            body: model.body.into_string(),
            timestamp: model.timestamp.to_rfc3339(),
            client_id: model.client_id,
        }
    }
}

impl From<Notification> for ServerEvent {
    fn from(model: Notification) -> Self {
        match model {
            Notification::History { room_key, messages } => ServerEvent::History {
                room_key: room_key.into_string(),
                messages: messages.into_iter().map(MessageDto::from).collect(),
            },
            Notification::Presence { room_key, members } => ServerEvent::Presence {
                room_key: room_key.into_string(),
                connection_ids: members.into_iter().map(|id| id.into_string()).collect(),
            },
            Notification::Message { room_key, message } => ServerEvent::Message {
                room_key: room_key.into_string(),
                message: message.into(),
            },
            Notification::Ack {
                room_key,
                client_id,
                message,
            } => ServerEvent::Ack {
                room_key: room_key.into_string(),
                client_id,
                message: message.into(),
            },
            Notification::UserJoined {
                room_key,
                connection_id,
                at,
            } => ServerEvent::UserJoined {
                room_key: room_key.into_string(),
                connection_id: connection_id.into_string(),
                timestamp: at.to_rfc3339(),
            },
            Notification::UserLeft {
                room_key,
                connection_id,
                at,
            } => ServerEvent::UserLeft {
                room_key: room_key.into_string(),
                connection_id: connection_id.into_string(),
                timestamp: at.to_rfc3339(),
            },
            Notification::Error { message, client_id } => ServerEvent::Error { message, client_id },
        }
    }
}

impl From<&Attachment> for ServerEvent {
    fn from(attachment: &Attachment) -> Self {
        ServerEvent::Session {
            connection_id: attachment.connection_id.as_str().to_string(),
            resume_token: attachment.resume_token.as_str().to_string(),
            resumed: attachment.resumed,
        }
    }
}

impl From<RoomSummary> for RoomSummaryDto {
    fn from(model: RoomSummary) -> Self {
        Self {
            key: model.key.into_string(),
            participants: model
                .participants
                .into_iter()
                .map(|id| id.into_string())
                .collect(),
            message_count: model.message_count,
            created_at: model.created_at.to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ConnectionId, MessageBody, MessageId, RoomKey, SenderName, Timestamp,
    };

    fn chat_message() -> ChatMessage {
        ChatMessage {
            id: MessageId::generate(),
            sender: SenderName::sanitize(Some("alice"), 30),
            body: MessageBody::new(Some("Hello!"), 500).unwrap(),
            timestamp: Timestamp::new(1672531200123),
            client_id: Some("local-1".to_string()),
        }
    }

    #[test]
    fn test_client_message_to_inbound_event() {
        // テスト項目: DTO の message イベントが未検証の MessageDraft に変換される
        // given (前提条件):
        let dto = ClientEvent::Message {
            room_key: Some("study-1".to_string()),
            sender: Some("alice".to_string()),
            body: Some("Hello!".to_string()),
            timestamp: None,
            client_id: Some("local-1".to_string()),
        };

        // when (操作):
        let event: InboundEvent = dto.into();

        // then (期待する結果):
        assert_eq!(
            event,
            InboundEvent::Message(MessageDraft {
                room_key: Some("study-1".to_string()),
                sender: Some("alice".to_string()),
                body: Some("Hello!".to_string()),
                timestamp: None,
                client_id: Some("local-1".to_string()),
            })
        );
    }

    #[test]
    fn test_domain_chat_message_to_dto() {
        // テスト項目: ドメインの ChatMessage が RFC 3339 の時刻を持つ DTO に変換される
        // given (前提条件):
        let model = chat_message();
        let id = model.id.as_str().to_string();

        // when (操作):
        let dto: MessageDto = model.into();

        // then (期待する結果):
        assert_eq!(dto.id, id);
        assert_eq!(dto.sender, "alice");
        assert_eq!(dto.body, "Hello!");
        assert_eq!(dto.timestamp, "2023-01-01T00:00:00.123Z");
        assert_eq!(dto.client_id.as_deref(), Some("local-1"));
    }

    #[test]
    fn test_presence_notification_to_dto() {
        // テスト項目: Presence 通知が connectionIds を持つ presence イベントに変換される
        // given (前提条件):
        let notification = Notification::Presence {
            room_key: RoomKey::or_default(Some("study-1")),
            members: vec![
                ConnectionId::new("a".to_string()).unwrap(),
                ConnectionId::new("b".to_string()).unwrap(),
            ],
        };

        // when (操作):
        let event: ServerEvent = notification.into();

        // then (期待する結果):
        assert_eq!(
            event,
            ServerEvent::Presence {
                room_key: "study-1".to_string(),
                connection_ids: vec!["a".to_string(), "b".to_string()],
            }
        );
    }

    #[test]
    fn test_room_summary_to_dto() {
        // テスト項目: RoomSummary が HTTP 用の DTO に変換される
        // given (前提条件):
        let summary = RoomSummary {
            key: RoomKey::or_default(Some("study-1")),
            participants: vec![ConnectionId::new("a".to_string()).unwrap()],
            message_count: 3,
            created_at: Timestamp::new(0),
        };

        // when (操作):
        let dto: RoomSummaryDto = summary.into();

        // then (期待する結果):
        assert_eq!(dto.key, "study-1");
        assert_eq!(dto.participants, vec!["a".to_string()]);
        assert_eq!(dto.message_count, 3);
        assert_eq!(dto.created_at, "1970-01-01T00:00:00.000Z");
    }
}
