//! JSON snapshot file, replaced atomically on every save.

use std::{
    fs::{self, File},
    io::Write,
    path::PathBuf,
};

use super::{PersistedSnapshot, SnapshotStore};
use crate::error::PersistenceError;

/// Snapshot stored as a single JSON document on disk
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SnapshotStore for JsonFileStore {
    /// A missing or empty file means nothing has been stored yet.
    fn load(&self) -> Result<Option<PersistedSnapshot>, PersistenceError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(None);
        }

        let snapshot = serde_json::from_str(&content)?;
        Ok(Some(snapshot))
    }

    /// Write to a sibling temp file, fsync, then rename over the target.
    fn save(&self, snapshot: &PersistedSnapshot) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(snapshot)?;

        let tmp_path = self.temp_path();
        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(json.as_bytes())?;
        tmp_file.sync_all()?;
        drop(tmp_file);

        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        tracing::trace!("Saved snapshot to {}", self.path.display());
        Ok(())
    }
}
