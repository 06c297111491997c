//! Application layer for bookmarks.
//!
//! This crate provides the session & bookmark view-model that coordinates the
//! identity provider, the bookmark store and the change feed defined in
//! `bookmarks-core`.

pub mod options;
pub mod view_model;

pub use options::SyncOptions;
pub use view_model::{BookmarkViewModel, LoadOutcome, MutationOutcome, Rejection};
