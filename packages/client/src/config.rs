//! Client configuration.
//!
//! The relay endpoint is environment-provided and read once at start-up by the
//! binary's argument parser (`--url`, falling back to [`ENDPOINT_ENV_VAR`] and
//! then [`DEFAULT_ENDPOINT`]).

use std::{path::PathBuf, time::Duration};

use crate::{
    error::ConfigError,
    transport::{ConnectOptions, Endpoint},
};

/// Environment variable holding the relay endpoint
pub const ENDPOINT_ENV_VAR: &str = "RELAY_SERVER_URL";

/// Relay endpoint used when nothing is configured
pub const DEFAULT_ENDPOINT: &str = "ws://localhost:5002";

/// Fixed name of the persisted snapshot
pub const STORAGE_NAME: &str = "chat-storage";

/// Directory under the platform data dir that holds the snapshot
const APP_DIR: &str = "relay-chat";

/// Where the persisted snapshot lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    /// JSON file on disk
    File(PathBuf),
    /// Process-local only; nothing survives a restart
    Memory,
}

impl StorageConfig {
    /// `<data dir>/relay-chat/chat-storage.json`, or in-memory when the
    /// platform has no data directory.
    pub fn default_location() -> Self {
        dirs::data_dir().map_or(Self::Memory, |dir| {
            Self::File(
                dir.join(APP_DIR).join(format!("{STORAGE_NAME}.json")),
            )
        })
    }
}

/// Session configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Relay service address
    pub endpoint: Endpoint,
    /// Options passed to the transport on every connect
    pub connect_options: ConnectOptions,
    /// Snapshot location
    pub storage: StorageConfig,
}

impl ClientConfig {
    /// Build a configuration from a raw endpoint string.
    pub fn new(endpoint: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: Endpoint::parse(endpoint)?,
            connect_options: ConnectOptions::default(),
            storage: StorageConfig::default_location(),
        })
    }

    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_options.connect_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_with_valid_endpoint() {
        // テスト項目: 有効なエンドポイントから設定が生成される
        // given (前提条件):
        let raw = "ws://127.0.0.1:5002";

        // when (操作):
        let config = ClientConfig::new(raw).unwrap();

        // then (期待する結果):
        assert_eq!(config.endpoint.as_str(), "ws://127.0.0.1:5002");
        assert_eq!(config.connect_options, ConnectOptions::default());
    }

    #[test]
    fn test_new_with_invalid_endpoint() {
        // テスト項目: 不正なエンドポイントは ConfigError になる
        // given (前提条件):
        let raw = "ftp://example.com";

        // when (操作):
        let result = ClientConfig::new(raw);

        // then (期待する結果):
        assert!(matches!(
            result,
            Err(ConfigError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn test_builder_overrides() {
        // テスト項目: ストレージとタイムアウトを上書きできる
        // given (前提条件):
        let config = ClientConfig::new(DEFAULT_ENDPOINT).unwrap();

        // when (操作):
        let config = config
            .with_storage(StorageConfig::Memory)
            .with_connect_timeout(Duration::from_secs(3));

        // then (期待する結果):
        assert_eq!(config.storage, StorageConfig::Memory);
        assert_eq!(config.connect_options.connect_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_default_location_uses_storage_name() {
        // テスト項目: 既定の保存先ファイル名は chat-storage.json
        // given (前提条件):

        // when (操作):
        let storage = StorageConfig::default_location();

        // then (期待する結果):
        if let StorageConfig::File(path) = storage {
            assert!(path.ends_with("relay-chat/chat-storage.json"));
        }
    }
}
