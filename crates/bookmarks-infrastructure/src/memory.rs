//! In-process backend.
//!
//! [`MemoryDatabase`] stands in for the hosted project: one shared table, row
//! ownership on reads and deletes, and change fan-out to every open
//! subscription whose filter matches. Each [`MemoryClient`] is one "page
//! instance" with its own signed-in state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bookmarks_core::bookmark::{Bookmark, BookmarkRepository, NewBookmark};
use bookmarks_core::change_feed::{
    ChangeEvent, ChangeFeed, ChangeFilter, ChangeKind, Subscription, SubscriptionHandle,
};
use bookmarks_core::identity::{Identity, IdentityProvider};
use bookmarks_core::{BookmarkError, Result};
use chrono::{DateTime, Duration, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    rows: Vec<Bookmark>,
    last_created_at: Option<DateTime<Utc>>,
    subscribers: HashMap<u64, (ChangeFilter, mpsc::UnboundedSender<ChangeEvent>)>,
    next_subscription: u64,
}

impl Tables {
    /// Strictly increasing creation timestamps, even within one clock tick.
    fn next_created_at(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let next = match self.last_created_at {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_created_at = Some(next);
        next
    }

    fn publish(&mut self, event: ChangeEvent) {
        self.subscribers.retain(|id, (filter, sender)| {
            if !filter.matches(&event) {
                return !sender.is_closed();
            }
            let delivered = sender.send(event.clone()).is_ok();
            if !delivered {
                tracing::debug!("[MemoryDatabase] Dropping closed subscription {}", id);
            }
            delivered
        });
    }
}

/// Shared in-memory table of bookmarks.
pub struct MemoryDatabase {
    table: String,
    tables: Mutex<Tables>,
}

impl MemoryDatabase {
    pub fn new(table: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            table: table.into(),
            tables: Mutex::new(Tables::default()),
        })
    }

    /// A signed-out client that signs in as `account` on login.
    pub fn client(self: &Arc<Self>, account: Identity) -> MemoryClient {
        MemoryClient {
            database: Arc::clone(self),
            account,
            session: Mutex::new(None),
        }
    }

    /// A client that starts out signed in as `account`.
    pub fn signed_in_client(self: &Arc<Self>, account: Identity) -> MemoryClient {
        let client = self.client(account.clone());
        *client.session_slot() = Some(account);
        client
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        // A panic while holding the lock leaves plain data behind; keep using it.
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Inserts a row directly, bypassing sessions, and notifies subscribers.
    pub fn seed(&self, new: NewBookmark) -> String {
        let mut tables = self.tables();
        let row = Bookmark {
            id: Uuid::new_v4().to_string(),
            title: new.title,
            url: new.url,
            user_id: new.user_id,
            created_at: tables.next_created_at(),
        };
        let id = row.id.clone();
        let event = self.event(ChangeKind::Insert, &row.user_id);
        tables.rows.push(row);
        tables.publish(event);
        id
    }

    /// Renames a row, producing an update notification. Returns whether the
    /// row existed.
    pub fn rename(&self, id: &str, title: impl Into<String>) -> bool {
        let mut tables = self.tables();
        let Some(row) = tables.rows.iter_mut().find(|b| b.id == id) else {
            return false;
        };
        row.title = title.into();
        let event = self.event(ChangeKind::Update, &row.user_id);
        tables.publish(event);
        true
    }

    /// Every stored row regardless of owner, newest first.
    pub fn all_rows(&self) -> Vec<Bookmark> {
        let mut rows = self.tables().rows.clone();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows
    }

    pub fn subscriber_count(&self) -> usize {
        self.tables().subscribers.len()
    }

    fn event(&self, kind: ChangeKind, owner: &str) -> ChangeEvent {
        ChangeEvent {
            kind,
            table: self.table.clone(),
            owner_id: Some(owner.to_string()),
        }
    }
}

/// One client of a [`MemoryDatabase`].
///
/// Implements all three boundary traits. Login is immediate.
pub struct MemoryClient {
    database: Arc<MemoryDatabase>,
    account: Identity,
    session: Mutex<Option<Identity>>,
}

impl MemoryClient {
    pub fn database(&self) -> &Arc<MemoryDatabase> {
        &self.database
    }

    fn session_slot(&self) -> MutexGuard<'_, Option<Identity>> {
        self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn signed_in(&self) -> Result<Identity> {
        self.session_slot()
            .clone()
            .ok_or_else(|| BookmarkError::auth("not signed in"))
    }
}

#[async_trait]
impl IdentityProvider for MemoryClient {
    async fn current_session(&self) -> Result<Option<Identity>> {
        Ok(self.session_slot().clone())
    }

    async fn begin_oauth_login(&self, _return_to: &str) -> Result<()> {
        *self.session_slot() = Some(self.account.clone());
        tracing::debug!("[MemoryClient] Signed in as {}", self.account.id);
        Ok(())
    }

    async fn end_session(&self) -> Result<()> {
        *self.session_slot() = None;
        Ok(())
    }
}

#[async_trait]
impl BookmarkRepository for MemoryClient {
    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<Bookmark>> {
        let identity = self.signed_in()?;
        let mut rows: Vec<Bookmark> = self
            .database
            .tables()
            .rows
            .iter()
            // Row policy: only the caller's rows are visible at all.
            .filter(|b| b.user_id == identity.id && b.user_id == owner_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn insert(&self, bookmark: &NewBookmark) -> Result<String> {
        let identity = self.signed_in()?;
        if bookmark.user_id != identity.id {
            return Err(BookmarkError::data_access(
                "new row violates row-level security policy",
            ));
        }
        Ok(self.database.seed(bookmark.clone()))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let identity = self.signed_in()?;
        let mut tables = self.database.tables();
        let position = tables
            .rows
            .iter()
            .position(|b| b.id == id && b.user_id == identity.id);
        if let Some(index) = position {
            let row = tables.rows.remove(index);
            let event = self.database.event(ChangeKind::Delete, &row.user_id);
            tables.publish(event);
        }
        Ok(())
    }
}

#[async_trait]
impl ChangeFeed for MemoryClient {
    async fn subscribe(&self, filter: ChangeFilter) -> Result<Subscription> {
        let mut tables = self.database.tables();
        tables.next_subscription += 1;
        let id = tables.next_subscription;
        let (sender, events) = mpsc::unbounded_channel();
        tables.subscribers.insert(id, (filter, sender));
        Ok(Subscription {
            handle: SubscriptionHandle::new(id),
            events,
        })
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<()> {
        let id = handle.id();
        match self.database.tables().subscribers.remove(&id) {
            Some(_) => Ok(()),
            None => Err(BookmarkError::not_found("subscription", id.to_string())),
        }
    }
}
