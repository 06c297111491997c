//! `config.toml` storage.
//!
//! The file is created with defaults on first run. Backend credentials can be
//! supplied through the environment instead, which never writes them to disk.

use std::path::PathBuf;

use bookmarks_core::Result;
use bookmarks_core::config::RootConfig;

use super::atomic_toml::AtomicTomlFile;

/// Overrides `backend.url`.
pub const ENV_URL: &str = "SUPABASE_URL";
/// Overrides `backend.anon_key`.
pub const ENV_ANON_KEY: &str = "SUPABASE_ANON_KEY";

/// Loads [`RootConfig`].
pub struct ConfigStorage {
    file: AtomicTomlFile<RootConfig>,
}

impl ConfigStorage {
    pub fn new(path: PathBuf) -> Self {
        Self {
            file: AtomicTomlFile::new(path),
        }
    }

    /// Reads the file, creating it with defaults if missing, then applies the
    /// process environment overrides.
    pub fn load(&self) -> Result<RootConfig> {
        let mut config = self.load_file()?;
        apply_env_overrides(&mut config, |key| std::env::var(key).ok());
        Ok(config)
    }

    /// Reads the file only, creating it with defaults if missing.
    pub fn load_file(&self) -> Result<RootConfig> {
        let existed = self.file.path().exists();
        let config = self.file.load_or_create(RootConfig::default())?;
        if !existed {
            tracing::info!(
                "[ConfigStorage] Created default config at {}",
                self.file.path().display()
            );
        }
        Ok(config)
    }
}

/// Applies `SUPABASE_URL` / `SUPABASE_ANON_KEY` from `lookup`.
///
/// Empty values are ignored.
pub fn apply_env_overrides<F>(config: &mut RootConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(ENV_URL).filter(|v| !v.trim().is_empty()) {
        tracing::debug!("[ConfigStorage] backend.url taken from {}", ENV_URL);
        config.backend.url = url;
    }
    if let Some(key) = lookup(ENV_ANON_KEY).filter(|v| !v.trim().is_empty()) {
        tracing::debug!("[ConfigStorage] backend.anon_key taken from {}", ENV_ANON_KEY);
        config.backend.anon_key = key;
    }
}
