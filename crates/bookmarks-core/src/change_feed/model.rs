//! Change event models.

use serde::{Deserialize, Serialize};

/// The kind of row mutation a notification reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Set of change kinds a subscription wants delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventMask {
    pub insert: bool,
    pub update: bool,
    pub delete: bool,
}

impl EventMask {
    /// Insert, update and delete.
    pub fn all() -> Self {
        Self {
            insert: true,
            update: true,
            delete: true,
        }
    }

    pub fn contains(&self, kind: ChangeKind) -> bool {
        match kind {
            ChangeKind::Insert => self.insert,
            ChangeKind::Update => self.update,
            ChangeKind::Delete => self.delete,
        }
    }

    /// Event name understood by the realtime channel: `*` when every kind is
    /// wanted, otherwise the single kind.
    ///
    /// Returns `None` for masks that need more than one channel binding.
    pub fn channel_event(&self) -> Option<&'static str> {
        match (self.insert, self.update, self.delete) {
            (true, true, true) => Some("*"),
            (true, false, false) => Some("INSERT"),
            (false, true, false) => Some("UPDATE"),
            (false, false, true) => Some("DELETE"),
            _ => None,
        }
    }
}

impl Default for EventMask {
    fn default() -> Self {
        Self::all()
    }
}

/// What a subscription listens to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeFilter {
    pub schema: String,
    pub table: String,
    pub events: EventMask,
    /// When set, only rows owned by this identity are reported.
    /// `None` means every row change in the table, whoever owns it.
    pub owner_id: Option<String>,
}

impl ChangeFilter {
    /// Unfiltered subscription to every change on `schema.table`.
    pub fn table(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            events: EventMask::all(),
            owner_id: None,
        }
    }

    pub fn scoped_to(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    /// Whether `event` should be delivered to this subscription.
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if event.table != self.table || !self.events.contains(event.kind) {
            return false;
        }
        match (&self.owner_id, &event.owner_id) {
            (None, _) => true,
            (Some(wanted), Some(owner)) => wanted == owner,
            (Some(_), None) => false,
        }
    }
}

/// A single row-change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub table: String,
    /// Owner of the changed row, when the channel reports it
    pub owner_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: ChangeKind, owner: Option<&str>) -> ChangeEvent {
        ChangeEvent {
            kind,
            table: "bookmarks".to_string(),
            owner_id: owner.map(str::to_string),
        }
    }

    #[test]
    fn test_unfiltered_matches_every_owner() {
        let filter = ChangeFilter::table("public", "bookmarks");
        assert!(filter.matches(&event(ChangeKind::Insert, Some("u1"))));
        assert!(filter.matches(&event(ChangeKind::Delete, Some("u2"))));
        assert!(filter.matches(&event(ChangeKind::Update, None)));
    }

    #[test]
    fn test_scoped_filter_drops_other_owners() {
        let filter = ChangeFilter::table("public", "bookmarks").scoped_to("u1");
        assert!(filter.matches(&event(ChangeKind::Insert, Some("u1"))));
        assert!(!filter.matches(&event(ChangeKind::Insert, Some("u2"))));
        assert!(!filter.matches(&event(ChangeKind::Delete, None)));
    }

    #[test]
    fn test_other_table_never_matches() {
        let filter = ChangeFilter::table("public", "bookmarks");
        let mut other = event(ChangeKind::Insert, Some("u1"));
        other.table = "notes".to_string();
        assert!(!filter.matches(&other));
    }

    #[test]
    fn test_channel_event_names() {
        assert_eq!(EventMask::all().channel_event(), Some("*"));
        let only_delete = EventMask {
            insert: false,
            update: false,
            delete: true,
        };
        assert_eq!(only_delete.channel_event(), Some("DELETE"));
        let insert_delete = EventMask {
            insert: true,
            update: false,
            delete: true,
        };
        assert_eq!(insert_delete.channel_event(), None);
    }
}
