//! Storage layer for atomic file operations.

mod atomic_toml;
mod config_storage;
mod session_storage;

pub use atomic_toml::{AtomicTomlError, AtomicTomlFile};
pub use config_storage::{ConfigStorage, ENV_ANON_KEY, ENV_URL, apply_env_overrides};
pub use session_storage::SessionFile;
