pub mod bookmark;
pub mod change_feed;
pub mod config;
pub mod error;
pub mod identity;
pub mod view;

// Re-export common error type
pub use error::{BookmarkError, Result};
