//! Wire schemas for relay events.
//!
//! Every inbound payload is parsed and validated here before anything else
//! sees it; nothing from the relay is trusted as already typed.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    error::ProtocolError,
    transport::{
        EVENT_CONNECT, EVENT_DISCONNECT, EVENT_JOIN_ROOM, EVENT_RECEIVE_MESSAGE,
        EVENT_SEND_MESSAGE,
    },
};

/// Envelope of one WebSocket text frame: `{"event": "...", "data": ...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl WireFrame {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

/// Chat message as it travels over the wire.
///
/// `timestamp` stays a raw JSON value at this layer: an RFC 3339 string,
/// epoch milliseconds, `null` or absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessageDto {
    pub room: String,
    pub user: String,
    pub text: String,
    #[serde(default)]
    pub timestamp: Value,
}

/// Validated inbound event
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Connect,
    Disconnect,
    ReceiveMessage(ChatMessageDto),
    /// An event this client does not interpret
    Other { event: String },
}

impl InboundEvent {
    /// Parse and validate an event name plus payload.
    pub fn parse(event: &str, payload: &Value) -> Result<Self, ProtocolError> {
        match event {
            EVENT_CONNECT => Ok(Self::Connect),
            EVENT_DISCONNECT => Ok(Self::Disconnect),
            EVENT_RECEIVE_MESSAGE => ChatMessageDto::deserialize(payload)
                .map(Self::ReceiveMessage)
                .map_err(|e| ProtocolError::MalformedPayload {
                    event: event.to_string(),
                    reason: e.to_string(),
                }),
            other => Ok(Self::Other {
                event: other.to_string(),
            }),
        }
    }
}

/// Outbound event
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    JoinRoom(String),
    SendMessage(ChatMessageDto),
}

impl OutboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinRoom(_) => EVENT_JOIN_ROOM,
            Self::SendMessage(_) => EVENT_SEND_MESSAGE,
        }
    }

    pub fn into_payload(self) -> Value {
        match self {
            Self::JoinRoom(room) => Value::String(room),
            Self::SendMessage(dto) => json!({
                "room": dto.room,
                "user": dto.user,
                "text": dto.text,
                "timestamp": dto.timestamp,
            }),
        }
    }
}
