//! Conversion logic between DTOs and domain entities.

use serde_json::Value;

use crate::{
    domain::{Message, MessageText, Timestamp},
    dto::wire::ChatMessageDto,
    error::ProtocolError,
};

// ========================================
// DTO → Domain Entity
// ========================================

/// Normalize a raw wire timestamp. Never fails; unusable values become
/// [`Timestamp::Invalid`].
pub fn timestamp_from_wire(value: &Value) -> Timestamp {
    match value {
        Value::String(text) => Timestamp::parse(text),
        Value::Number(number) => match number.as_i64() {
            Some(millis) => Timestamp::from_millis(millis),
            None => number
                .as_f64()
                .filter(|f| f.is_finite())
                .map_or(Timestamp::Invalid, |f| Timestamp::from_millis(f as i64)),
        },
        _ => Timestamp::Invalid,
    }
}

impl TryFrom<ChatMessageDto> for Message {
    type Error = ProtocolError;

    fn try_from(dto: ChatMessageDto) -> Result<Self, Self::Error> {
        let timestamp = timestamp_from_wire(&dto.timestamp);
        let text = MessageText::new(dto.text)?;
        Ok(Message::new(dto.room, dto.user, text, timestamp))
    }
}

// ========================================
// Domain Entity → DTO
// ========================================

/// Serialize a timestamp for the wire. The sentinel becomes `null`.
pub fn timestamp_to_wire(timestamp: Timestamp) -> Value {
    timestamp.to_serialized().map_or(Value::Null, Value::String)
}

impl From<&Message> for ChatMessageDto {
    fn from(model: &Message) -> Self {
        Self {
            room: model.room().to_string(),
            user: model.user().to_string(),
            text: model.text().to_string(),
            timestamp: timestamp_to_wire(model.timestamp()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dto(text: &str, timestamp: Value) -> ChatMessageDto {
        ChatMessageDto {
            room: "general".to_string(),
            user: "Bo".to_string(),
            text: text.to_string(),
            timestamp,
        }
    }

    #[test]
    fn test_dto_chat_message_to_domain() {
        // テスト項目: DTO の ChatMessage がドメインエンティティに変換される
        // given (前提条件):
        let dto_msg = dto("hi", json!("2023-01-01T00:00:00.000Z"));

        // when (操作):
        let domain_msg = Message::try_from(dto_msg).unwrap();

        // then (期待する結果):
        assert_eq!(domain_msg.room(), "general");
        assert_eq!(domain_msg.user(), "Bo");
        assert_eq!(domain_msg.text(), "hi");
        assert_eq!(domain_msg.timestamp(), Timestamp::from_millis(1_672_531_200_000));
    }

    #[test]
    fn test_dto_with_unparseable_timestamp_gets_sentinel() {
        // テスト項目: 解釈できないタイムスタンプは Invalid センチネルに置き換えられる
        // given (前提条件):
        let dto_msg = dto("hi", json!("not-a-date"));

        // when (操作):
        let domain_msg = Message::try_from(dto_msg).unwrap();

        // then (期待する結果):
        assert!(domain_msg.timestamp().is_invalid());
    }

    #[test]
    fn test_dto_with_epoch_millis_timestamp() {
        // テスト項目: 数値のエポックミリ秒が正規化される
        // given (前提条件):
        let dto_msg = dto("hi", json!(1_672_531_200_000_i64));

        // when (操作):
        let domain_msg = Message::try_from(dto_msg).unwrap();

        // then (期待する結果):
        assert_eq!(domain_msg.timestamp(), Timestamp::from_millis(1_672_531_200_000));
    }

    #[test]
    fn test_dto_with_blank_text_is_rejected() {
        // テスト項目: 本文が空白のみの DTO は InvalidMessage エラーになる
        // given (前提条件):
        let dto_msg = dto("   ", json!("2023-01-01T00:00:00.000Z"));

        // when (操作):
        let result = Message::try_from(dto_msg);

        // then (期待する結果):
        assert!(matches!(result, Err(ProtocolError::InvalidMessage(_))));
    }

    #[test]
    fn test_timestamp_from_wire_non_scalar_is_invalid() {
        // テスト項目: 文字列・数値以外のタイムスタンプは Invalid になる
        // given (前提条件):
        let values = [Value::Null, json!(true), json!({"t": 1}), json!([1])];

        // when (操作) / then (期待する結果):
        for value in values {
            assert!(timestamp_from_wire(&value).is_invalid());
        }
    }

    #[test]
    fn test_domain_chat_message_to_dto() {
        // テスト項目: ドメインエンティティの ChatMessage が DTO に変換される
        // given (前提条件):
        let domain_msg = Message::new(
            "lobby",
            "alice",
            MessageText::try_from("Hello!").unwrap(),
            Timestamp::from_millis(1_672_531_200_000),
        );

        // when (操作):
        let dto_msg = ChatMessageDto::from(&domain_msg);

        // then (期待する結果):
        assert_eq!(dto_msg.room, "lobby");
        assert_eq!(dto_msg.user, "alice");
        assert_eq!(dto_msg.text, "Hello!");
        assert_eq!(dto_msg.timestamp, json!("2023-01-01T00:00:00.000Z"));
    }

    #[test]
    fn test_invalid_timestamp_serializes_as_null() {
        // テスト項目: Invalid センチネルは null としてシリアライズされる
        // given (前提条件):
        let timestamp = Timestamp::Invalid;

        // when (操作):
        let value = timestamp_to_wire(timestamp);

        // then (期待する結果):
        assert_eq!(value, Value::Null);
    }
}
