//! Session & bookmark view-model.
//!
//! `BookmarkViewModel` owns the client-side lifecycle: it resolves the session,
//! loads the signed-in owner's bookmarks, keeps them in step with the change
//! feed and mediates add/remove. Front ends read [`ViewState`] snapshots from a
//! `watch` channel and call the async operations from spawned tasks.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use bookmarks_core::bookmark::{
    Bookmark, BookmarkRepository, DraftInput, DraftRejection, PENDING_ID_PREFIX, sort_newest_first,
};
use bookmarks_core::change_feed::{ChangeEvent, ChangeFeed, ChangeFilter, Subscription, SubscriptionHandle};
use bookmarks_core::identity::{Identity, IdentityProvider};
use bookmarks_core::view::{ViewMode, ViewState};
use chrono::Utc;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::options::SyncOptions;

/// Result of a reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The collection was replaced with this many rows.
    Applied(usize),
    /// A newer reload was issued, or the identity changed, before this one
    /// resolved. The result was discarded.
    Stale,
    /// The store call failed; the previous collection is untouched.
    Failed,
}

/// Why a mutation was refused before any remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    EmptyDraft(DraftRejection),
    NotSignedIn,
    /// The row is an optimistic placeholder with no stored counterpart yet.
    PendingRow,
}

/// Result of an add or remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The store accepted the mutation.
    Submitted,
    /// Refused locally; no remote call was made.
    Rejected(Rejection),
    /// The store call failed; draft and list are as before the attempt.
    Failed,
}

/// The one standing change subscription.
struct ActiveSubscription {
    handle: SubscriptionHandle,
    owner_id: String,
    cancel: CancellationToken,
    listener: JoinHandle<()>,
}

/// View-model for the single bookmark screen.
///
/// # Lifecycle
///
/// 1. [`activate`](Self::activate) resolves the session once. With an identity
///    present it subscribes to the change feed, then loads the collection.
/// 2. Every change notification triggers a full reload for the identity the
///    subscription was opened for.
/// 3. [`logout`](Self::logout) clears local state first, then signs out
///    remotely. [`login`](Self::login) runs the OAuth round trip and
///    re-resolves.
/// 4. [`deactivate`](Self::deactivate) releases the subscription.
///
/// # Failures
///
/// Remote failures never reach the view state. They are logged and the state
/// stays as it was before the attempt.
pub struct BookmarkViewModel {
    identity_provider: Arc<dyn IdentityProvider>,
    repository: Arc<dyn BookmarkRepository>,
    change_feed: Arc<dyn ChangeFeed>,
    options: SyncOptions,
    state: watch::Sender<ViewState>,
    /// Highest reload sequence number issued so far
    reload_seq: AtomicU64,
    activated: AtomicBool,
    subscription: Mutex<Option<ActiveSubscription>>,
}

impl BookmarkViewModel {
    /// Creates a view-model in the `Loading` mode.
    pub fn new(
        identity_provider: Arc<dyn IdentityProvider>,
        repository: Arc<dyn BookmarkRepository>,
        change_feed: Arc<dyn ChangeFeed>,
        options: SyncOptions,
    ) -> Self {
        let (state, _) = watch::channel(ViewState::default());
        Self {
            identity_provider,
            repository,
            change_feed,
            options,
            state,
            reload_seq: AtomicU64::new(0),
            activated: AtomicBool::new(false),
            subscription: Mutex::new(None),
        }
    }

    // ============================================================================
    // State access
    // ============================================================================

    /// Current snapshot.
    pub fn snapshot(&self) -> ViewState {
        self.state.borrow().clone()
    }

    /// Receiver that is notified on every state change.
    pub fn watch(&self) -> watch::Receiver<ViewState> {
        self.state.subscribe()
    }

    pub fn mode(&self) -> ViewMode {
        self.state.borrow().mode()
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Owner the change subscription is currently open for, if any.
    pub async fn subscribed_owner(&self) -> Option<String> {
        self.subscription
            .lock()
            .await
            .as_ref()
            .map(|active| active.owner_id.clone())
    }

    // ============================================================================
    // Session lifecycle
    // ============================================================================

    /// Resolves the session and, if someone is signed in, subscribes and
    /// loads. Runs once; later calls only return the current mode.
    pub async fn activate(self: &Arc<Self>) -> ViewMode {
        if self.activated.swap(true, Ordering::SeqCst) {
            tracing::warn!("[ViewModel] activate called twice, ignoring");
            return self.mode();
        }

        if let Some(identity) = self.resolve_session().await {
            self.attach(identity).await;
        }
        self.mode()
    }

    /// Asks the identity provider for a current session and records the
    /// answer. A provider error counts as "nobody signed in".
    pub async fn resolve_session(&self) -> Option<Identity> {
        let identity = match self.identity_provider.current_session().await {
            Ok(identity) => identity,
            Err(e) => {
                tracing::warn!("[ViewModel] Session resolution failed, treating as signed out: {}", e);
                None
            }
        };

        self.state.send_modify(|state| {
            if state.identity != identity {
                state.bookmarks.clear();
                state.draft.clear();
            }
            state.resolved = true;
            state.identity = identity.clone();
        });

        match &identity {
            Some(identity) => tracing::info!("[ViewModel] Session resolved for {}", identity.id),
            None => tracing::info!("[ViewModel] No session"),
        }
        identity
    }

    /// Runs the OAuth round trip. When the provider hands control back the
    /// session is resolved again, as on a fresh activation.
    ///
    /// Provider errors leave the view unchanged.
    pub async fn login(self: &Arc<Self>) -> ViewMode {
        tracing::info!("[ViewModel] Starting login, returning to {}", self.options.return_to);

        if let Err(e) = self
            .identity_provider
            .begin_oauth_login(&self.options.return_to)
            .await
        {
            tracing::warn!("[ViewModel] Login did not complete: {}", e);
            return self.mode();
        }

        if let Some(identity) = self.resolve_session().await {
            self.attach(identity).await;
        }
        self.mode()
    }

    /// Signs out.
    ///
    /// Local state is cleared before anything is awaited, so the view is
    /// `Unauthenticated` while the remote sign-out is still in flight.
    pub async fn logout(&self) {
        // Any reload still in flight belongs to the old identity.
        self.reload_seq.fetch_add(1, Ordering::SeqCst);
        self.state.send_modify(|state| {
            state.resolved = true;
            state.identity = None;
            state.bookmarks.clear();
            state.draft.clear();
        });
        tracing::info!("[ViewModel] Signed out locally");

        self.detach().await;

        if let Err(e) = self.identity_provider.end_session().await {
            tracing::warn!("[ViewModel] Remote sign-out failed: {}", e);
        }
    }

    /// Releases the change subscription. Safe to call more than once.
    pub async fn deactivate(&self) {
        self.detach().await;
        tracing::info!("[ViewModel] Deactivated");
    }

    // ============================================================================
    // Collection load & synchronization
    // ============================================================================

    /// Replaces the collection with `identity`'s bookmarks.
    ///
    /// Each call takes a new sequence number. The result is applied only if no
    /// later reload was issued meanwhile and `identity` is still the signed-in
    /// identity.
    pub async fn load_bookmarks(&self, identity: &Identity) -> LoadOutcome {
        let seq = self.reload_seq.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!("[ViewModel] Reload #{} for {}", seq, identity.id);

        let mut rows = match self.repository.list_for_owner(&identity.id).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!("[ViewModel] Reload #{} failed, keeping previous list: {}", seq, e);
                return LoadOutcome::Failed;
            }
        };
        sort_newest_first(&mut rows);
        let count = rows.len();

        let applied = self.state.send_if_modified(|state| {
            let current = state.identity.as_ref().map(|i| i.id.as_str());
            if self.reload_seq.load(Ordering::SeqCst) != seq || current != Some(identity.id.as_str()) {
                return false;
            }
            state.bookmarks = rows;
            true
        });

        if applied {
            tracing::debug!("[ViewModel] Reload #{} applied ({} rows)", seq, count);
            LoadOutcome::Applied(count)
        } else {
            tracing::debug!("[ViewModel] Reload #{} is stale, discarded", seq);
            LoadOutcome::Stale
        }
    }

    /// Subscribes for `identity`, then loads its collection.
    async fn attach(self: &Arc<Self>, identity: Identity) {
        self.subscribe_for(&identity).await;
        self.load_bookmarks(&identity).await;
    }

    /// Makes sure exactly one subscription exists and that it belongs to
    /// `identity`, recreating it when the identity changed.
    async fn subscribe_for(self: &Arc<Self>, identity: &Identity) {
        let mut slot = self.subscription.lock().await;

        // A logout may have landed while we waited for the slot.
        let current = self.state.borrow().identity.as_ref().map(|i| i.id.clone());
        if current.as_deref() != Some(identity.id.as_str()) {
            tracing::debug!("[ViewModel] {} is no longer signed in, not subscribing", identity.id);
            return;
        }

        if slot.as_ref().is_some_and(|active| active.owner_id == identity.id) {
            return;
        }
        if let Some(previous) = slot.take() {
            self.release(previous).await;
        }

        let mut filter = ChangeFilter::table(&self.options.schema, &self.options.table);
        if self.options.scope_channel_to_owner {
            filter = filter.scoped_to(identity.id.clone());
        }

        match self.change_feed.subscribe(filter).await {
            Ok(Subscription { handle, events }) => {
                tracing::info!(
                    "[ViewModel] Subscribed to {} changes (handle {}, scoped: {})",
                    self.options.table,
                    handle.id(),
                    self.options.scope_channel_to_owner
                );
                let cancel = CancellationToken::new();
                let listener = tokio::spawn(listen_for_changes(
                    Arc::downgrade(self),
                    identity.clone(),
                    events,
                    cancel.clone(),
                ));
                *slot = Some(ActiveSubscription {
                    handle,
                    owner_id: identity.id.clone(),
                    cancel,
                    listener,
                });
            }
            Err(e) => {
                tracing::warn!(
                    "[ViewModel] Could not subscribe to changes, list will only update on reload: {}",
                    e
                );
            }
        }
    }

    async fn detach(&self) {
        let previous = self.subscription.lock().await.take();
        if let Some(previous) = previous {
            self.release(previous).await;
        }
    }

    async fn release(&self, active: ActiveSubscription) {
        let ActiveSubscription {
            handle,
            owner_id,
            cancel,
            listener,
        } = active;

        cancel.cancel();
        let id = handle.id();
        if let Err(e) = self.change_feed.unsubscribe(handle).await {
            tracing::warn!("[ViewModel] Unsubscribe of handle {} failed: {}", id, e);
        }
        // The listener exits on its own once it observes the cancellation.
        drop(listener);
        tracing::info!("[ViewModel] Released subscription {} for {}", id, owner_id);
    }

    // ============================================================================
    // Draft input
    // ============================================================================

    pub fn draft(&self) -> DraftInput {
        self.state.borrow().draft.clone()
    }

    pub fn set_draft_title(&self, title: impl Into<String>) {
        let title = title.into();
        self.state.send_if_modified(|state| {
            if state.draft.title == title {
                return false;
            }
            state.draft.title = title;
            true
        });
    }

    pub fn set_draft_url(&self, url: impl Into<String>) {
        let url = url.into();
        self.state.send_if_modified(|state| {
            if state.draft.url == url {
                return false;
            }
            state.draft.url = url;
            true
        });
    }

    // ============================================================================
    // Mutations
    // ============================================================================

    /// Submits the current draft for the signed-in identity.
    ///
    /// Without optimistic updates the list does not change here; it follows
    /// the change notification the insert produces.
    pub async fn add_bookmark(&self) -> MutationOutcome {
        let (identity, draft) = {
            let state = self.state.borrow();
            (state.identity.clone(), state.draft.clone())
        };
        let Some(identity) = identity else {
            return MutationOutcome::Rejected(Rejection::NotSignedIn);
        };
        let new = match draft.to_new_bookmark(&identity) {
            Ok(new) => new,
            Err(reason) => return MutationOutcome::Rejected(Rejection::EmptyDraft(reason)),
        };

        let pending_id = if self.options.optimistic_updates {
            let row = Bookmark::pending(&new, Utc::now());
            let id = row.id.clone();
            self.state.send_modify(|state| state.bookmarks.insert(0, row));
            Some(id)
        } else {
            None
        };

        match self.repository.insert(&new).await {
            Ok(id) => {
                tracing::info!("[ViewModel] Bookmark {} inserted", id);
                // Input typed while the insert was in flight is kept.
                self.state.send_if_modified(|state| {
                    if state.draft != draft {
                        return false;
                    }
                    state.draft.clear();
                    true
                });
                MutationOutcome::Submitted
            }
            Err(e) => {
                tracing::warn!("[ViewModel] Insert failed: {}", e);
                if let Some(pending_id) = pending_id {
                    self.state.send_if_modified(|state| {
                        let before = state.bookmarks.len();
                        state.bookmarks.retain(|b| b.id != pending_id);
                        state.bookmarks.len() != before
                    });
                }
                MutationOutcome::Failed
            }
        }
    }

    /// Deletes the bookmark with `id`.
    ///
    /// Ownership is not checked here; the store's access policy decides.
    /// Deleting an id that does not exist succeeds quietly.
    pub async fn remove_bookmark(&self, id: &str) -> MutationOutcome {
        if id.starts_with(PENDING_ID_PREFIX) {
            return MutationOutcome::Rejected(Rejection::PendingRow);
        }

        let removed = if self.options.optimistic_updates {
            let mut removed = None;
            self.state.send_if_modified(|state| {
                match state.bookmarks.iter().position(|b| b.id == id) {
                    Some(index) => {
                        removed = Some((index, state.bookmarks.remove(index)));
                        true
                    }
                    None => false,
                }
            });
            removed
        } else {
            None
        };

        match self.repository.delete(id).await {
            Ok(()) => {
                tracing::info!("[ViewModel] Bookmark {} deleted", id);
                MutationOutcome::Submitted
            }
            Err(e) => {
                tracing::warn!("[ViewModel] Delete of {} failed: {}", id, e);
                if let Some((index, row)) = removed {
                    self.state.send_if_modified(|state| {
                        let owner = state.identity.as_ref().map(|i| i.id.as_str());
                        if owner != Some(row.user_id.as_str())
                            || state.bookmarks.iter().any(|b| b.id == row.id)
                        {
                            return false;
                        }
                        let index = index.min(state.bookmarks.len());
                        state.bookmarks.insert(index, row);
                        true
                    });
                }
                MutationOutcome::Failed
            }
        }
    }
}

impl Drop for BookmarkViewModel {
    fn drop(&mut self) {
        if let Some(active) = self.subscription.get_mut().take() {
            active.cancel.cancel();
            tracing::warn!(
                "[ViewModel] Dropped without deactivate; subscription {} was not released",
                active.handle.id()
            );
        }
    }
}

/// Re-fetches on every notification until cancelled or the feed closes.
///
/// `identity` is fixed for the lifetime of the subscription; an identity
/// change tears the subscription down and starts a new listener.
async fn listen_for_changes(
    view_model: Weak<BookmarkViewModel>,
    identity: Identity,
    mut events: mpsc::UnboundedReceiver<ChangeEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = events.recv() => {
                let Some(event) = event else {
                    tracing::warn!("[ViewModel] Change feed closed; list no longer follows remote changes");
                    break;
                };
                let Some(view_model) = view_model.upgrade() else {
                    break;
                };
                tracing::debug!(
                    "[ViewModel] {:?} on {} (owner {:?}), reloading",
                    event.kind,
                    event.table,
                    event.owner_id
                );
                view_model.load_bookmarks(&identity).await;
            }
        }
    }
}
