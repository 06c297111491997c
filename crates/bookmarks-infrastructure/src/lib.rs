//! Infrastructure layer for bookmarks.
//!
//! Adapters behind the `bookmarks-core` boundary traits:
//!
//! - [`supabase`]: hosted backend (GoTrue auth, PostgREST data, Realtime changes)
//! - [`memory`]: in-process backend used by tests and demo mode
//! - [`storage`]: `config.toml` and persisted auth session files
//! - [`paths`]: where those files live

pub mod memory;
pub mod paths;
pub mod storage;
pub mod supabase;

pub use memory::{MemoryClient, MemoryDatabase};
pub use paths::{BookmarkPaths, PathError};
pub use storage::{AtomicTomlFile, ConfigStorage, SessionFile};
pub use supabase::{PostgRestRepository, RealtimeFeed, SupabaseAuth, SupabaseClient};
