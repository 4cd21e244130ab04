//! Terminal chat client for a relay-chat relay.
//!
//! Connects on start, restores the previous history, room and display name,
//! and disconnects on exit. Type a message and press Enter to send it to the
//! current room.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin relay-chat
//! cargo run --bin relay-chat -- --url ws://127.0.0.1:5002 --name Alice --room lobby
//! RELAY_SERVER_URL=ws://chat.example.com cargo run --bin relay-chat -- --no-persist
//! ```

use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;

use relay_chat_client::{
    ClientConfig, SessionController,
    config::{DEFAULT_ENDPOINT, ENDPOINT_ENV_VAR, StorageConfig},
    error::ClientError,
    persistence::PersistenceAdapter,
    runner::run_client,
    transport::{Transport, WebSocketTransport},
};
use relay_chat_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "relay-chat")]
#[command(about = "Terminal chat client with persistent history", long_about = None)]
struct Args {
    /// Relay server URL (ws, wss, http or https)
    #[arg(short = 'u', long, env = ENDPOINT_ENV_VAR, default_value = DEFAULT_ENDPOINT)]
    url: String,

    /// Snapshot file (defaults to the platform data directory)
    #[arg(short = 's', long, conflicts_with = "no_persist")]
    storage: Option<PathBuf>,

    /// Keep history in memory only
    #[arg(long)]
    no_persist: bool,

    /// Handshake timeout in seconds
    #[arg(long, default_value_t = 10)]
    connect_timeout_secs: u64,

    /// Display name to use for this session
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// Room to join on connect
    #[arg(short = 'r', long)]
    room: Option<String>,
}

impl Args {
    fn into_config(self) -> Result<(ClientConfig, Option<String>, Option<String>), ClientError> {
        let storage = if self.no_persist {
            StorageConfig::Memory
        } else if let Some(path) = self.storage {
            StorageConfig::File(path)
        } else {
            StorageConfig::default_location()
        };

        let config = ClientConfig::new(&self.url)?
            .with_storage(storage)
            .with_connect_timeout(Duration::from_secs(self.connect_timeout_secs));

        Ok((config, self.name, self.room))
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Initialize tracing
    setup_logger(&[env!("CARGO_CRATE_NAME"), "relay_chat_client"], "info");

    let args = Args::parse();

    let (config, name, room) = match args.into_config() {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(2);
        }
    };

    let persistence = PersistenceAdapter::from_storage(&config.storage);
    let session = SessionController::new(
        || -> Arc<dyn Transport> { Arc::new(WebSocketTransport::new()) },
        persistence,
        config,
    );

    if let Some(name) = name {
        session.set_identity(name);
    }
    if let Some(room) = room {
        session.join_room(room);
    }

    // Run the client
    if let Err(e) = run_client(session).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
