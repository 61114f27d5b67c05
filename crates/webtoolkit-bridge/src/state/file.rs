//! State file lifecycle: open, save on change, save on drop.

use std::path::PathBuf;

use webtoolkit::{StateReader, StateWriter, ToolkitState};

use super::StateStore;
use crate::types::BridgeResult;

/// A [`StateStore`] backed by a JSON state file.
pub struct FileStateStore {
    state: ToolkitState,
    file_path: PathBuf,
    dirty: bool,
}

impl FileStateStore {
    /// Open the state file at `path`, starting empty if it does not exist.
    pub fn open(path: &str) -> BridgeResult<Self> {
        let file_path = PathBuf::from(path);

        let state = if file_path.exists() {
            tracing::info!("Opening existing state file: {}", file_path.display());
            StateReader::read_from_file(&file_path)?
        } else {
            tracing::info!("Creating new state file: {}", file_path.display());
            ToolkitState::default()
        };

        tracing::info!(
            "State loaded. {} entries, capturing {}",
            state.entries.len(),
            if state.capturing { "on" } else { "off" }
        );

        Ok(Self {
            state,
            file_path,
            dirty: false,
        })
    }
}

impl StateStore for FileStateStore {
    fn state(&self) -> &ToolkitState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ToolkitState {
        self.dirty = true;
        &mut self.state
    }

    fn save(&mut self) -> BridgeResult<()> {
        if !self.dirty {
            return Ok(());
        }

        StateWriter::write_to_file(&self.state, &self.file_path)?;

        self.dirty = false;
        tracing::debug!("Saved state file: {}", self.file_path.display());
        Ok(())
    }
}

impl Drop for FileStateStore {
    fn drop(&mut self) {
        if self.dirty {
            if let Err(e) = self.save() {
                tracing::error!("Failed to save on drop: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = FileStateStore::open(path.to_str().unwrap()).unwrap();
        assert!(store.state().entries.is_empty());
        assert!(!store.state().capturing);
        assert!(!path.exists());
    }

    #[test]
    fn test_changes_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deep").join("state.json");
        let path_str = path.to_str().unwrap();

        {
            let mut store = FileStateStore::open(path_str).unwrap();
            store.state_mut().capturing = true;
            store.state_mut().settings.include_time = false;
            store.save().unwrap();
        }

        let store = FileStateStore::open(path_str).unwrap();
        assert!(store.state().capturing);
        assert!(!store.state().settings.include_time);
    }

    #[test]
    fn test_drop_flushes_pending_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let path_str = path.to_str().unwrap();

        {
            let mut store = FileStateStore::open(path_str).unwrap();
            store.state_mut().capturing = true;
        }

        assert!(path.exists());
        assert!(FileStateStore::open(path_str).unwrap().state().capturing);
    }

    #[test]
    fn test_corrupt_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(FileStateStore::open(path.to_str().unwrap()).is_err());
    }
}
