//! Bookmark repository trait.

use async_trait::async_trait;

use super::model::{Bookmark, NewBookmark};
use crate::error::Result;

/// Boundary to the hosted bookmark table.
///
/// Ownership is enforced by the store's access policy; implementations must
/// still apply the owner filter on reads.
#[async_trait]
pub trait BookmarkRepository: Send + Sync {
    /// Lists the bookmarks owned by `owner_id`, newest first.
    /// Returns an empty vector when there are none.
    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<Bookmark>>;

    /// Inserts a bookmark and returns the identifier assigned by the store.
    async fn insert(&self, bookmark: &NewBookmark) -> Result<String>;

    /// Deletes the bookmark with `id`. Deleting a missing id succeeds.
    async fn delete(&self, id: &str) -> Result<()>;
}
