//! Transport Binding: the session's only contact with the relay.
//!
//! A binding owns one connection and a table of event handlers. It knows
//! nothing about rooms or messages; payloads are opaque JSON values.
//!
//! Implementations:
//! - `websocket`: tokio-tungstenite connection, used in production
//! - `memory`: deterministic in-process binding for tests and embedders

pub mod memory;
pub mod registry;
pub mod websocket;

use std::{fmt, sync::Arc, time::Duration};

use serde_json::Value;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;

use crate::error::ConfigError;

pub use memory::InMemoryTransport;
pub use registry::HandlerRegistry;
pub use websocket::WebSocketTransport;

/// Inbound: the connection is usable
pub const EVENT_CONNECT: &str = "connect";
/// Inbound: the connection was lost
pub const EVENT_DISCONNECT: &str = "disconnect";
/// Inbound: a chat message from the relay
pub const EVENT_RECEIVE_MESSAGE: &str = "receive_message";
/// Outbound: join a room
pub const EVENT_JOIN_ROOM: &str = "join_room";
/// Outbound: post a chat message
pub const EVENT_SEND_MESSAGE: &str = "send_message";

/// Callback for one inbound event.
///
/// Identity is the `Arc` allocation: registering a clone of the same handler
/// twice is a no-op.
pub type EventHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Wrap a closure as an [`EventHandler`].
pub fn handler<F>(f: F) -> EventHandler
where
    F: Fn(&Value) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Transport Binding contract.
///
/// Every method returns immediately. Outcomes are observed through the
/// `connect`/`disconnect` events. Handlers are invoked in the order the
/// connection produced the events.
pub trait Transport: Send + Sync {
    /// Establish the connection. No-op if already open.
    fn open(&self, endpoint: &Endpoint, options: &ConnectOptions);

    /// Tear down the connection, if any. Always safe to call.
    fn close(&self);

    /// Register `handler` for `event`. Returns `false` if the pair was
    /// already registered.
    fn on(&self, event: &str, handler: EventHandler) -> bool;

    /// Deregister `handler` for `event`. Returns `false` if it was not
    /// registered.
    fn off(&self, event: &str, handler: &EventHandler) -> bool;

    /// Send one event. Dropped with a log line when not connected.
    fn emit(&self, event: &str, payload: Value);

    /// Whether a connection is currently open or being opened.
    fn is_open(&self) -> bool;
}

/// Creates a fresh binding for each connect cycle.
pub trait TransportFactory: Send + Sync {
    fn create(&self) -> Arc<dyn Transport>;
}

impl<F> TransportFactory for F
where
    F: Fn() -> Arc<dyn Transport> + Send + Sync,
{
    fn create(&self) -> Arc<dyn Transport> {
        self()
    }
}

/// Options applied when opening a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Upper bound on the opening handshake
    pub connect_timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Validated relay address.
///
/// `http`/`https` addresses are accepted and rewritten to `ws`/`wss`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint(String);

impl Endpoint {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidEndpoint {
            endpoint: raw.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = raw.trim();
        let (scheme, rest) = trimmed
            .split_once("://")
            .ok_or_else(|| invalid("missing scheme"))?;

        let scheme = match scheme.to_ascii_lowercase().as_str() {
            "ws" | "http" => "ws",
            "wss" | "https" => "wss",
            _ => return Err(invalid("scheme must be ws, wss, http or https")),
        };

        let url = format!("{scheme}://{rest}");
        url.as_str()
            .into_client_request()
            .map_err(|e| invalid(&e.to_string()))?;

        Ok(Self(url))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_accepts_ws_and_wss() {
        // テスト項目: ws / wss のアドレスはそのまま受け入れられる
        // given (前提条件):
        let inputs = ["ws://127.0.0.1:5002/ws", "wss://relay.example.com"];

        // when (操作) / then (期待する結果):
        for input in inputs {
            let endpoint = Endpoint::parse(input).unwrap();
            assert_eq!(endpoint.as_str(), input);
        }
    }

    #[test]
    fn test_endpoint_rewrites_http_schemes() {
        // テスト項目: http / https は ws / wss に書き換えられる
        // given (前提条件):
        let http = "http://localhost:5002";
        let https = "HTTPS://relay.example.com/socket";

        // when (操作):
        let http_endpoint = Endpoint::parse(http).unwrap();
        let https_endpoint = Endpoint::parse(https).unwrap();

        // then (期待する結果):
        assert_eq!(http_endpoint.as_str(), "ws://localhost:5002");
        assert_eq!(https_endpoint.as_str(), "wss://relay.example.com/socket");
    }

    #[test]
    fn test_endpoint_rejects_missing_scheme() {
        // テスト項目: スキームのないアドレスは拒否される
        // given (前提条件):
        let input = "localhost:5002";

        // when (操作):
        let result = Endpoint::parse(input);

        // then (期待する結果):
        assert!(matches!(result, Err(ConfigError::InvalidEndpoint { .. })));
    }

    #[test]
    fn test_endpoint_rejects_unknown_scheme() {
        // テスト項目: 対応外のスキームは拒否される
        // given (前提条件):
        let input = "ftp://localhost:5002";

        // when (操作):
        let result = Endpoint::parse(input);

        // then (期待する結果):
        assert!(matches!(result, Err(ConfigError::InvalidEndpoint { .. })));
    }

    #[test]
    fn test_endpoint_rejects_missing_host() {
        // テスト項目: ホスト名のないアドレスは拒否される
        // given (前提条件):
        let input = "ws://";

        // when (操作):
        let result = Endpoint::parse(input);

        // then (期待する結果):
        assert!(result.is_err());
    }
}
