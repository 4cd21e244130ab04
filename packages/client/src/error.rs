//! Error types for the chat session client.

use thiserror::Error;

pub use crate::domain::ValueObjectError;

/// Client-specific errors surfaced to the binary
#[derive(Debug, Error)]
pub enum ClientError {
    /// Start-up configuration is invalid
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Terminal input could not be initialized
    #[error("Input error: {0}")]
    Input(String),
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Relay endpoint is not a usable network address
    #[error("Invalid relay endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
}

/// Inbound payload validation errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Payload does not match the event's schema
    #[error("Malformed '{event}' payload: {reason}")]
    MalformedPayload { event: String, reason: String },

    /// Payload is well-formed but violates a message invariant
    #[error("Invalid message: {0}")]
    InvalidMessage(#[from] ValueObjectError),
}

/// Snapshot storage errors
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Reading or writing the storage medium failed
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot could not be (de)serialized
    #[error("Snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
