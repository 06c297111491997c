//! Bookmark domain models and repository trait.
//!
//! Bookmarks are user-owned link records. They are created and deleted,
//! never edited in place.

mod model;
mod repository;

pub use model::{Bookmark, DraftInput, DraftRejection, NewBookmark, PENDING_ID_PREFIX, sort_newest_first};
pub use repository::BookmarkRepository;
