//! Message formatting utilities for client display.

use chrono::{Local, TimeZone};
use relay_chat_shared::time::format_clock_time;

use crate::{
    domain::{Message, Timestamp, message::INVALID_TIMESTAMP_TEXT},
    session::ConnectionStatus,
};

/// Message formatter for client display
pub struct MessageFormatter;

impl MessageFormatter {
    /// Format a chat message in the local time zone
    pub fn format_message(message: &Message) -> String {
        Self::format_message_in(message, &Local)
    }

    /// Format a chat message as `user HH:MM text`
    ///
    /// # Arguments
    ///
    /// * `message` - The message to render
    /// * `tz` - Time zone used for the `HH:MM` part
    ///
    /// # Returns
    ///
    /// A single line. Messages without a usable timestamp show `Invalid Date`
    /// in place of the time.
    pub fn format_message_in<Tz>(message: &Message, tz: &Tz) -> String
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        format!(
            "{} {} {}",
            message.user(),
            Self::format_time(message.timestamp(), tz),
            message.text()
        )
    }

    fn format_time<Tz>(timestamp: Timestamp, tz: &Tz) -> String
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        match timestamp.instant() {
            Some(instant) => format_clock_time(&instant, tz),
            None => INVALID_TIMESTAMP_TEXT.to_string(),
        }
    }

    /// Format the connection status banner
    pub fn format_status(status: ConnectionStatus) -> String {
        let label = match status {
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::Connecting => "Connecting...",
            ConnectionStatus::Disconnected => "Disconnected",
        };
        format!("\n[{}]\n", label)
    }

    /// Format the header shown on start-up and after switching rooms
    pub fn format_room_header(room: &str, identity: &str) -> String {
        format!(
            "\n============================================================\n\
             Room: {}  |  You: {}\n\
             ============================================================\n",
            room, identity
        )
    }

    /// Format the restored history, oldest first
    pub fn format_history<Tz>(messages: &[Message], tz: &Tz) -> String
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        if messages.is_empty() {
            return "(No messages yet)\n".to_string();
        }

        let mut output = String::new();
        for message in messages {
            output.push_str(&Self::format_message_in(message, tz));
            output.push('\n');
        }
        output
    }

    /// Format the list of interactive commands
    pub fn format_help() -> String {
        "Commands: /room <name>, /name <name>, /connect, /disconnect, /quit\n".to_string()
    }
}
