//! Rendering projection.

use crate::bookmark::{Bookmark, DraftInput};

/// Shown in place of the list when the collection is empty.
pub const EMPTY_LIST_MESSAGE: &str = "No bookmarks yet";

/// One list row: an open-link affordance and a remove affordance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookmarkRow {
    pub id: String,
    pub title: String,
    pub url: String,
    /// Optimistic row not yet confirmed by the store
    pub pending: bool,
}

impl From<&Bookmark> for BookmarkRow {
    fn from(bookmark: &Bookmark) -> Self {
        Self {
            id: bookmark.id.clone(),
            title: bookmark.title.clone(),
            url: bookmark.url.clone(),
            pending: bookmark.is_pending(),
        }
    }
}

/// The screen a front end should draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Loading,
    /// Single login affordance.
    SignIn,
    /// Two input fields, an add affordance and the list.
    Bookmarks {
        heading: String,
        rows: Vec<BookmarkRow>,
        draft: DraftInput,
    },
}

impl Screen {
    /// The empty-state message, when the list screen has nothing to show.
    pub fn empty_message(&self) -> Option<&'static str> {
        match self {
            Screen::Bookmarks { rows, .. } if rows.is_empty() => Some(EMPTY_LIST_MESSAGE),
            _ => None,
        }
    }
}
