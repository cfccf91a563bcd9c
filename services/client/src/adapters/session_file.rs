//! services/client/src/adapters/session_file.rs
//!
//! A `TokenStore` that keeps the persisted session in a JSON file, so a signed-in
//! user survives a restart of the client.

use std::fs;
use std::path::{Path, PathBuf};

use personnel_core::ports::{PortError, PortResult, TokenStore};
use personnel_core::PersistedSession;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_dir(&self) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Option<PersistedSession> {
        if !self.path.exists() {
            return None;
        }
        let json = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&json) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!(path = %self.path.display(), "Ignoring unreadable session file: {}", e);
                None
            }
        }
    }

    fn save(&self, session: &PersistedSession) -> PortResult<()> {
        self.ensure_dir()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let json = serde_json::to_string_pretty(session)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        fs::write(&self.path, json).map_err(|e| PortError::Unexpected(e.to_string()))?;
        debug!(path = %self.path.display(), "Session persisted.");
        Ok(())
    }

    fn clear(&self) {
        if !self.path.exists() {
            return;
        }
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), "Failed to remove session file: {}", e);
        }
    }
}
