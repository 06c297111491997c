//! Bookmark domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::identity::Identity;

/// Prefix of locally generated ids for rows that have not been stored yet.
pub const PENDING_ID_PREFIX: &str = "pending-";

/// A stored bookmark.
///
/// Field names match the hosted `bookmarks` table so rows deserialize as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    /// Identifier assigned by the store
    pub id: String,
    /// Display title
    pub title: String,
    /// Link target, stored exactly as entered
    pub url: String,
    /// Owning identity (`Identity::id`)
    pub user_id: String,
    /// Creation timestamp, used only for ordering
    pub created_at: DateTime<Utc>,
}

impl Bookmark {
    /// Builds a local placeholder row for an insert that is still in flight.
    pub fn pending(new: &NewBookmark, created_at: DateTime<Utc>) -> Self {
        Self {
            id: format!("{}{}", PENDING_ID_PREFIX, Uuid::new_v4()),
            title: new.title.clone(),
            url: new.url.clone(),
            user_id: new.user_id.clone(),
            created_at,
        }
    }

    /// Whether this row is an optimistic placeholder.
    pub fn is_pending(&self) -> bool {
        self.id.starts_with(PENDING_ID_PREFIX)
    }
}

/// Insert payload; the store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBookmark {
    pub title: String,
    pub url: String,
    pub user_id: String,
}

/// Why a draft could not be submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DraftRejection {
    #[error("title is empty")]
    EmptyTitle,
    #[error("url is empty")]
    EmptyUrl,
}

/// In-progress, not yet submitted bookmark fields.
///
/// Only emptiness is checked: whitespace-only titles and malformed URLs are
/// accepted and stored as typed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftInput {
    pub title: String,
    pub url: String,
}

impl DraftInput {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.url.is_empty()
    }

    pub fn clear(&mut self) {
        self.title.clear();
        self.url.clear();
    }

    /// Builds the insert payload for `owner`, or says why the draft is not
    /// submittable.
    pub fn to_new_bookmark(&self, owner: &Identity) -> Result<NewBookmark, DraftRejection> {
        if self.title.is_empty() {
            return Err(DraftRejection::EmptyTitle);
        }
        if self.url.is_empty() {
            return Err(DraftRejection::EmptyUrl);
        }
        Ok(NewBookmark {
            title: self.title.clone(),
            url: self.url.clone(),
            user_id: owner.id.clone(),
        })
    }
}

/// Orders a collection newest first. Stable for equal timestamps.
pub fn sort_newest_first(bookmarks: &mut [Bookmark]) {
    bookmarks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
