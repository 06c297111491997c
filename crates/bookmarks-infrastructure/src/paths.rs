//! Path management for bookmarks configuration files.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/bookmarks/         # Config directory (platform config dir)
//! ├── config.toml              # Application configuration
//! ├── session.json             # Persisted auth session (0600)
//! └── logs/                    # Application logs
//!     └── bookmarks.log.YYYY-MM-DD
//! ```

use std::path::{Path, PathBuf};

use bookmarks_core::BookmarkError;

const APP_DIR: &str = "bookmarks";

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// The platform config directory could not be determined.
    ConfigDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::ConfigDirNotFound => write!(f, "Cannot find config directory"),
        }
    }
}

impl std::error::Error for PathError {}

impl From<PathError> for BookmarkError {
    fn from(e: PathError) -> Self {
        BookmarkError::config(e.to_string())
    }
}

/// Resolved locations of every file the application reads or writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookmarkPaths {
    config_dir: PathBuf,
    config_file: PathBuf,
}

impl BookmarkPaths {
    /// Resolves the platform default (`~/.config/bookmarks` on Linux).
    pub fn resolve() -> Result<Self, PathError> {
        let base = dirs::config_dir().ok_or(PathError::ConfigDirNotFound)?;
        Ok(Self::with_config_dir(base.join(APP_DIR)))
    }

    /// Uses `dir` as the config directory.
    pub fn with_config_dir(dir: impl Into<PathBuf>) -> Self {
        let config_dir = dir.into();
        let config_file = config_dir.join("config.toml");
        Self {
            config_dir,
            config_file,
        }
    }

    /// Uses an explicit config file; its parent directory holds the other files.
    pub fn with_config_file(file: impl Into<PathBuf>) -> Self {
        let config_file = file.into();
        let config_dir = config_file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            config_dir,
            config_file,
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Path to `config.toml`.
    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Path to the persisted auth session.
    ///
    /// # Security Note
    ///
    /// The file holds refresh tokens and is written with mode 600 on Unix.
    pub fn session_file(&self) -> PathBuf {
        self.config_dir.join("session.json")
    }

    /// Directory for the rolling log files.
    pub fn logs_dir(&self) -> PathBuf {
        self.config_dir.join("logs")
    }

    /// Creates the config and log directories if missing.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::create_dir_all(self.logs_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_layout_under_config_dir() {
        let paths = BookmarkPaths::with_config_dir("/tmp/bm");
        assert_eq!(paths.config_file(), Path::new("/tmp/bm/config.toml"));
        assert_eq!(paths.session_file(), PathBuf::from("/tmp/bm/session.json"));
        assert_eq!(paths.logs_dir(), PathBuf::from("/tmp/bm/logs"));
    }

    #[test]
    fn test_explicit_config_file() {
        let paths = BookmarkPaths::with_config_file("/etc/bm/alt.toml");
        assert_eq!(paths.config_dir(), Path::new("/etc/bm"));
        assert_eq!(paths.config_file(), Path::new("/etc/bm/alt.toml"));

        let bare = BookmarkPaths::with_config_file("alt.toml");
        assert_eq!(bare.config_dir(), Path::new("."));
    }

    #[test]
    fn test_resolve_ends_with_app_dir() {
        if let Ok(paths) = BookmarkPaths::resolve() {
            assert!(paths.config_dir().ends_with(APP_DIR));
        }
    }

    #[test]
    fn test_ensure_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let paths = BookmarkPaths::with_config_dir(temp_dir.path().join("nested"));
        paths.ensure_dirs().unwrap();
        assert!(paths.logs_dir().is_dir());
    }
}
