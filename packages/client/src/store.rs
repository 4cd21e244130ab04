//! Message Store: ordered, append-only chat history.

use std::slice::Iter;

use crate::domain::Message;

/// Append-only sequence of messages in arrival order.
///
/// There is no eviction; the history grows for the life of the session.
#[derive(Debug, Clone, Default)]
pub struct MessageStore {
    messages: Vec<Message>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from previously persisted messages, keeping their order.
    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Add a message to the end of the sequence and return the new length.
    pub fn append(&mut self, message: Message) -> usize {
        self.messages.push(message);
        self.messages.len()
    }

    /// Point-in-time copy of the whole history.
    ///
    /// Later appends are not reflected in a snapshot already taken.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> Iter<'_, Message> {
        self.messages.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MessageText, Timestamp};
    use proptest::prelude::*;

    fn message(user: &str, text: &str, millis: i64) -> Message {
        Message::new(
            "general",
            user,
            MessageText::try_from(text).unwrap(),
            Timestamp::from_millis(millis),
        )
    }

    #[test]
    fn test_append_returns_updated_length() {
        // テスト項目: append は追加後の件数を返す
        // given (前提条件):
        let mut store = MessageStore::new();

        // when (操作):
        let first = store.append(message("alice", "hi", 1000));
        let second = store.append(message("bob", "hello", 2000));

        // then (期待する結果):
        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_snapshot_reflects_appended_message() {
        // テスト項目: append 直後の snapshot に追加したメッセージが含まれる
        // given (前提条件):
        let mut store = MessageStore::new();
        let msg = message("alice", "hi", 1000);

        // when (操作):
        store.append(msg.clone());
        let snapshot = store.snapshot();

        // then (期待する結果):
        assert_eq!(snapshot.last(), Some(&msg));
    }

    #[test]
    fn test_snapshot_is_point_in_time() {
        // テスト項目: 取得済みの snapshot は後続の append の影響を受けない
        // given (前提条件):
        let mut store = MessageStore::new();
        store.append(message("alice", "first", 1000));
        let snapshot = store.snapshot();

        // when (操作):
        store.append(message("bob", "second", 2000));

        // then (期待する結果):
        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_append_accepts_invalid_timestamp() {
        // テスト項目: Invalid タイムスタンプを持つメッセージも拒否されない
        // given (前提条件):
        let mut store = MessageStore::new();
        let msg = Message::new(
            "general",
            "Bo",
            MessageText::try_from("hi").unwrap(),
            Timestamp::Invalid,
        );

        // when (操作):
        let len = store.append(msg);

        // then (期待する結果):
        assert_eq!(len, 1);
        assert!(store.snapshot()[0].timestamp().is_invalid());
    }

    proptest! {
        #[test]
        fn prop_snapshot_preserves_arrival_order(
            texts in prop::collection::vec("[a-z]{1,12}", 0..40)
        ) {
            let mut store = MessageStore::new();
            let mut previous_len = 0;

            for (i, text) in texts.iter().enumerate() {
                let len = store.append(message("user", text, i as i64));
                prop_assert!(len > previous_len);
                previous_len = len;
            }

            let snapshot_texts: Vec<&str> = store.iter().map(Message::text).collect();
            let expected: Vec<&str> = texts.iter().map(String::as_str).collect();
            prop_assert_eq!(snapshot_texts, expected);
        }
    }
}
