//! View-model snapshot.

use super::mode::ViewMode;
use super::screen::{BookmarkRow, Screen};
use crate::bookmark::{Bookmark, DraftInput};
use crate::identity::Identity;

/// Everything a front end needs to draw one frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    /// Whether session resolution has finished at least once
    pub resolved: bool,
    /// The signed-in identity, if any
    pub identity: Option<Identity>,
    /// The owner's bookmarks, newest first
    pub bookmarks: Vec<Bookmark>,
    /// Unsubmitted input fields
    pub draft: DraftInput,
}

impl ViewState {
    pub fn mode(&self) -> ViewMode {
        ViewMode::derive(self.resolved, self.identity.is_some())
    }

    /// Projects the snapshot onto the screen to draw.
    pub fn screen(&self) -> Screen {
        match (self.mode(), &self.identity) {
            (ViewMode::Authenticated, Some(identity)) => Screen::Bookmarks {
                heading: identity.display_name().to_string(),
                rows: self.bookmarks.iter().map(BookmarkRow::from).collect(),
                draft: self.draft.clone(),
            },
            (ViewMode::Loading, _) => Screen::Loading,
            _ => Screen::SignIn,
        }
    }
}
