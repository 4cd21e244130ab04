//! Process-local snapshot store, used with `--no-persist` and in tests.

use std::sync::{Mutex, PoisonError};

use super::{PersistedSnapshot, SnapshotStore};
use crate::error::PersistenceError;

#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    snapshot: Mutex<Option<PersistedSnapshot>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with a snapshot.
    pub fn with_snapshot(snapshot: PersistedSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
        }
    }

    /// The most recently saved snapshot.
    pub fn current(&self) -> Option<PersistedSnapshot> {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn load(&self) -> Result<Option<PersistedSnapshot>, PersistenceError> {
        Ok(self.current())
    }

    fn save(&self, snapshot: &PersistedSnapshot) -> Result<(), PersistenceError> {
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = Some(snapshot.clone());
        Ok(())
    }
}

/// Lets a caller keep a handle on the store it hands to an adapter.
impl<T: SnapshotStore + ?Sized> SnapshotStore for std::sync::Arc<T> {
    fn load(&self) -> Result<Option<PersistedSnapshot>, PersistenceError> {
        (**self).load()
    }

    fn save(&self, snapshot: &PersistedSnapshot) -> Result<(), PersistenceError> {
        (**self).save(snapshot)
    }
}
