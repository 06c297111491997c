//! Persisted auth session (`session.json`).

use std::fs;
use std::path::{Path, PathBuf};

use bookmarks_core::Result;
use bookmarks_core::identity::AuthSession;

use super::atomic_toml::write_atomically;

const SESSION_FILE_MODE: u32 = 0o600;

/// JSON file holding the last [`AuthSession`].
///
/// # Security Note
///
/// The file contains a refresh token. It is written with mode 600 on Unix.
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the stored session, or `None` if there is none.
    ///
    /// A file that no longer parses is treated as absent and removed.
    pub fn load(&self) -> Result<Option<AuthSession>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(None);
        }
        match serde_json::from_str(&content) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                tracing::warn!(
                    "[SessionFile] Discarding unreadable session file {}: {}",
                    self.path.display(),
                    e
                );
                self.clear()?;
                Ok(None)
            }
        }
    }

    pub fn save(&self, session: &AuthSession) -> Result<()> {
        let json = serde_json::to_string_pretty(session)?;
        write_atomically(&self.path, json.as_bytes(), Some(SESSION_FILE_MODE))?;
        Ok(())
    }

    /// Removes the file. Missing files are fine.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
