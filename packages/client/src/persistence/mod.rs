//! Persistence Adapter: durable snapshot of {history, room, identity}.
//!
//! Connection status and transport handles are never part of a snapshot;
//! a restored session always starts `Disconnected`.

pub mod file;
pub mod memory;

use std::sync::{
    Mutex, PoisonError,
    atomic::{AtomicU64, Ordering},
};

use serde::{Deserialize, Serialize};
use tokio::runtime::{Handle, RuntimeFlavor};

use crate::{
    config::StorageConfig,
    domain::{Message, MessageText, Timestamp},
    error::PersistenceError,
    room::{DEFAULT_IDENTITY, DEFAULT_ROOM, RoomState},
    store::MessageStore,
};

pub use file::JsonFileStore;
pub use memory::InMemorySnapshotStore;

/// Current snapshot layout version
pub const SNAPSHOT_VERSION: u32 = 1;

/// One persisted message. The timestamp is kept as text and re-validated on
/// load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedMessage {
    pub room: String,
    pub user: String,
    pub text: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Durable record keyed by the fixed storage name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSnapshot {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub messages: Vec<PersistedMessage>,
    #[serde(default = "default_room")]
    pub room: String,
    #[serde(default = "default_identity")]
    pub identity: String,
}

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

fn default_room() -> String {
    DEFAULT_ROOM.to_string()
}

fn default_identity() -> String {
    DEFAULT_IDENTITY.to_string()
}

impl PersistedSnapshot {
    /// Capture the persisted subset of a session.
    pub fn capture(store: &MessageStore, room: &RoomState) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            messages: store
                .iter()
                .map(|message| PersistedMessage {
                    room: message.room().to_string(),
                    user: message.user().to_string(),
                    text: message.text().to_string(),
                    timestamp: message.timestamp().to_serialized(),
                })
                .collect(),
            room: room.room().to_string(),
            identity: room.identity().to_string(),
        }
    }
}

/// Durable storage for one snapshot
#[cfg_attr(test, mockall::automock)]
pub trait SnapshotStore: Send + Sync {
    /// `Ok(None)` when nothing has been stored yet.
    fn load(&self) -> Result<Option<PersistedSnapshot>, PersistenceError>;

    fn save(&self, snapshot: &PersistedSnapshot) -> Result<(), PersistenceError>;
}

/// State restored at start-up
#[derive(Debug, Clone, Default)]
pub struct HydratedState {
    pub store: MessageStore,
    pub room: RoomState,
}

/// A snapshot captured from session state, waiting to be written.
///
/// Sequence numbers follow capture order, so a write that arrives after a
/// newer one has landed is recognised as stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSave {
    sequence: u64,
    snapshot: PersistedSnapshot,
}

/// Loads and saves snapshots without ever failing the session.
pub struct PersistenceAdapter {
    store: Box<dyn SnapshotStore>,
    next_sequence: AtomicU64,
    /// Sequence of the last snapshot handed to the store
    written: Mutex<u64>,
}

impl PersistenceAdapter {
    pub fn new(store: Box<dyn SnapshotStore>) -> Self {
        Self {
            store,
            next_sequence: AtomicU64::new(1),
            written: Mutex::new(0),
        }
    }

    /// Adapter backed by a process-local store.
    pub fn in_memory() -> Self {
        Self::new(Box::new(InMemorySnapshotStore::new()))
    }

    /// Adapter for the configured storage location.
    pub fn from_storage(storage: &StorageConfig) -> Self {
        match storage {
            StorageConfig::File(path) => {
                tracing::debug!("Persisting session to {}", path.display());
                Self::new(Box::new(JsonFileStore::new(path.clone())))
            }
            StorageConfig::Memory => {
                tracing::debug!("Persistence disabled, keeping session in memory");
                Self::in_memory()
            }
        }
    }

    /// Read and validate the stored snapshot.
    ///
    /// An absent, unreadable or corrupt snapshot yields the defaults.
    pub fn load(&self) -> HydratedState {
        match self.store.load() {
            Ok(Some(snapshot)) => hydrate(snapshot),
            Ok(None) => {
                tracing::debug!("No persisted snapshot, starting with defaults");
                HydratedState::default()
            }
            Err(e) => {
                tracing::warn!("Failed to load persisted snapshot, using defaults: {}", e);
                HydratedState::default()
            }
        }
    }

    /// Copy the current history, room and identity for a later [`write`].
    ///
    /// Callers capture while holding whatever lock orders their state
    /// changes and write after releasing it.
    ///
    /// [`write`]: PersistenceAdapter::write
    pub fn capture(&self, store: &MessageStore, room: &RoomState) -> PendingSave {
        PendingSave {
            sequence: self.next_sequence.fetch_add(1, Ordering::Relaxed),
            snapshot: PersistedSnapshot::capture(store, room),
        }
    }

    /// Hand a captured snapshot to the store. Failures are logged.
    ///
    /// Writes are serialized; a snapshot older than the last one written is
    /// skipped so the stored state never moves backwards. Returns whether the
    /// store was called.
    pub fn write(&self, pending: PendingSave) -> bool {
        let mut written = self.written.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.sequence <= *written {
            tracing::trace!(
                "Skipping stale snapshot #{} (already wrote #{})",
                pending.sequence,
                *written
            );
            return false;
        }
        *written = pending.sequence;

        let result = match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| self.store.save(&pending.snapshot))
            }
            _ => self.store.save(&pending.snapshot),
        };
        if let Err(e) = result {
            tracing::error!("Failed to persist session snapshot: {}", e);
        }
        true
    }

    /// Capture and write in one step.
    pub fn save(&self, store: &MessageStore, room: &RoomState) {
        let pending = self.capture(store, room);
        self.write(pending);
    }
}

/// Turn a stored snapshot back into domain state. Timestamps are re-parsed,
/// never trusted.
fn hydrate(snapshot: PersistedSnapshot) -> HydratedState {
    if snapshot.version > SNAPSHOT_VERSION {
        tracing::warn!(
            "Snapshot version {} is newer than supported {}, reading known fields only",
            snapshot.version,
            SNAPSHOT_VERSION
        );
    }

    let total = snapshot.messages.len();
    let messages: Vec<Message> = snapshot
        .messages
        .into_iter()
        .filter_map(|persisted| {
            let timestamp = Timestamp::from_optional(persisted.timestamp.as_deref());
            match MessageText::new(persisted.text) {
                Ok(text) => Some(Message::new(persisted.room, persisted.user, text, timestamp)),
                Err(e) => {
                    tracing::warn!("Skipping persisted message: {}", e);
                    None
                }
            }
        })
        .collect();

    tracing::info!(
        "Restored {} of {} persisted messages (room '{}', identity '{}')",
        messages.len(),
        total,
        snapshot.room,
        snapshot.identity
    );

    HydratedState {
        store: MessageStore::from_messages(messages),
        room: RoomState::new(snapshot.room, snapshot.identity),
    }
}
