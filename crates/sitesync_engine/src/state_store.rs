use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use site_logging::{site_debug, site_warn};
use sitesync_core::SyncState;
use thiserror::Error;

use crate::persist::{write_atomic_if_changed, PersistError, WriteOutcome};

#[derive(Debug, Error)]
pub enum StateStoreError {
    #[error("cannot serialize sync state: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
}

/// JSON file holding the [`SyncState`] between runs.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing, unreadable or corrupt state all mean "start from scratch".
    pub fn load(&self) -> SyncState {
        let content = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                site_debug!("No sync state at {:?}; starting empty", self.path);
                return SyncState::new();
            }
            Err(err) => {
                site_warn!("Failed to read sync state from {:?}: {}", self.path, err);
                return SyncState::new();
            }
        };

        match serde_json::from_str(&content) {
            Ok(state) => state,
            Err(err) => {
                site_warn!("Failed to parse sync state from {:?}: {}", self.path, err);
                SyncState::new()
            }
        }
    }

    /// Atomic replace; the previous file stays intact if anything fails.
    pub fn save(&self, state: &SyncState) -> Result<WriteOutcome, StateStoreError> {
        let mut content = serde_json::to_string_pretty(state)?;
        content.push('\n');
        Ok(write_atomic_if_changed(&self.path, content.as_bytes())?)
    }
}
