//! UI utilities for the client.

use std::io::Write;

/// Prompt shown by the line editor
pub fn prompt(identity: &str, room: &str) -> String {
    format!("{}@{}> ", identity, room)
}

/// Redisplay the prompt after printing asynchronous output
pub fn redisplay_prompt(identity: &str, room: &str) {
    print!("{}", prompt(identity, room));
    std::io::stdout().flush().ok();
}

/// One line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send(String),
    Room(String),
    Name(String),
    Connect,
    Disconnect,
    Help,
    Quit,
    /// A slash command that is unknown or missing its argument
    Invalid(String),
}

impl Command {
    /// Parse a line. Input is trimmed; `None` for a blank line.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let Some(rest) = line.strip_prefix('/') else {
            return Some(Self::Send(line.to_string()));
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };

        let command = match (name, arg.is_empty()) {
            ("room", false) => Self::Room(arg.to_string()),
            ("name", false) => Self::Name(arg.to_string()),
            ("connect", _) => Self::Connect,
            ("disconnect", _) => Self::Disconnect,
            ("help", _) => Self::Help,
            ("quit" | "exit", _) => Self::Quit,
            _ => Self::Invalid(line.to_string()),
        };
        Some(command)
    }
}
