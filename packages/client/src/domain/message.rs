//! Chat message entity and its value objects.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

use super::error::ValueObjectError;

/// Text rendered for a timestamp that could not be normalized.
pub const INVALID_TIMESTAMP_TEXT: &str = "Invalid Date";

/// Date-time layouts without an offset, read as UTC
const NAIVE_DATE_TIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// A normalized point in time.
///
/// Raw serialized timestamps never live inside a [`Message`]; they are parsed
/// into either a valid instant or the [`Timestamp::Invalid`] sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timestamp {
    /// A valid absolute instant
    Valid(DateTime<Utc>),
    /// The timestamp was missing or unparseable
    Invalid,
}

impl Timestamp {
    /// Wrap a valid instant.
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self::Valid(instant)
    }

    /// Parse a textual timestamp.
    ///
    /// Accepts RFC 3339 (`2024-05-01T12:30:00.000Z`), date-times without
    /// seconds (`2024-05-01T12:30Z`, `2024-05-01T12:30+09:00`), naive
    /// date-times read as UTC, date-only `YYYY-MM-DD` and a bare `YYYY`, both
    /// at midnight UTC. Anything else yields [`Timestamp::Invalid`].
    pub fn parse(text: &str) -> Self {
        let text = text.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Self::Valid(dt.with_timezone(&Utc));
        }

        if let Ok(dt) = DateTime::parse_from_str(text, "%Y-%m-%dT%H:%M%:z") {
            return Self::Valid(dt.with_timezone(&Utc));
        }

        let naive = text.strip_suffix(['Z', 'z']).unwrap_or(text);
        for format in NAIVE_DATE_TIME_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(naive, format) {
                return Self::Valid(dt.and_utc());
            }
        }

        let date = if text.len() == 4 && text.bytes().all(|b| b.is_ascii_digit()) {
            text.parse().ok().and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1))
        } else {
            NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
        };

        date.and_then(|d| d.and_hms_opt(0, 0, 0))
            .map_or(Self::Invalid, |dt| Self::Valid(dt.and_utc()))
    }

    /// Build from Unix epoch milliseconds.
    pub fn from_millis(millis: i64) -> Self {
        DateTime::from_timestamp_millis(millis).map_or(Self::Invalid, Self::Valid)
    }

    /// Normalize an optional serialized value.
    pub fn from_optional(text: Option<&str>) -> Self {
        text.map_or(Self::Invalid, Self::parse)
    }

    /// The underlying instant, if valid.
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Valid(dt) => Some(*dt),
            Self::Invalid => None,
        }
    }

    /// Whether this is the invalid sentinel.
    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid)
    }

    /// Serialized form: RFC 3339 with millisecond precision, `None` for the sentinel.
    pub fn to_serialized(&self) -> Option<String> {
        self.instant()
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(instant: DateTime<Utc>) -> Self {
        Self::Valid(instant)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_serialized() {
            Some(text) => f.write_str(&text),
            None => f.write_str(INVALID_TIMESTAMP_TEXT),
        }
    }
}

/// Message body that is non-empty after trimming.
///
/// The original text (including surrounding whitespace) is preserved.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageText(String);

impl MessageText {
    /// Validate and wrap message text.
    pub fn new(text: String) -> Result<Self, ValueObjectError> {
        if text.trim().is_empty() {
            return Err(ValueObjectError::EmptyMessageText);
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for MessageText {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for MessageText {
    type Error = ValueObjectError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value.to_string())
    }
}

/// A chat message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    room: String,
    user: String,
    text: MessageText,
    timestamp: Timestamp,
}

impl Message {
    pub fn new(
        room: impl Into<String>,
        user: impl Into<String>,
        text: MessageText,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            room: room.into(),
            user: user.into(),
            text,
            timestamp,
        }
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn text(&self) -> &str {
        self.text.as_str()
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}
