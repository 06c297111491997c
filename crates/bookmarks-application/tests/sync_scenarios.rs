//! End-to-end view-model scenarios against the in-memory backend.

use std::sync::Arc;
use std::time::Duration;

use bookmarks_application::{BookmarkViewModel, LoadOutcome, MutationOutcome, SyncOptions};
use bookmarks_core::bookmark::NewBookmark;
use bookmarks_core::identity::Identity;
use bookmarks_core::view::{EMPTY_LIST_MESSAGE, Screen, ViewMode, ViewState};
use bookmarks_infrastructure::{MemoryClient, MemoryDatabase};

fn page(client: MemoryClient, options: SyncOptions) -> Arc<BookmarkViewModel> {
    let client = Arc::new(client);
    Arc::new(BookmarkViewModel::new(
        client.clone(),
        client.clone(),
        client,
        options,
    ))
}

async fn wait_until(vm: &BookmarkViewModel, predicate: impl FnMut(&ViewState) -> bool) -> ViewState {
    let mut rx = vm.watch();
    let state = tokio::time::timeout(Duration::from_secs(2), rx.wait_for(predicate))
        .await
        .expect("timed out waiting for view state")
        .expect("view-model dropped");
    state.clone()
}

fn docs() -> (&'static str, &'static str) {
    ("Docs", "https://example.com/docs")
}

#[tokio::test]
async fn test_empty_collection_shows_empty_message() {
    let database = MemoryDatabase::new("bookmarks");
    let vm = page(
        database.signed_in_client(Identity::new("u1")),
        SyncOptions::default(),
    );

    assert_eq!(vm.activate().await, ViewMode::Authenticated);
    let identity = Identity::new("u1");
    assert_eq!(vm.load_bookmarks(&identity).await, LoadOutcome::Applied(0));

    match vm.snapshot().screen() {
        Screen::Bookmarks { rows, .. } => assert!(rows.is_empty()),
        other => panic!("Expected bookmarks screen, got {:?}", other),
    }
    assert_eq!(EMPTY_LIST_MESSAGE, "No bookmarks yet");
    vm.deactivate().await;
}

#[tokio::test]
async fn test_add_then_remove_round_trip() {
    let database = MemoryDatabase::new("bookmarks");
    database.seed(NewBookmark {
        title: "Older".to_string(),
        url: "https://example.com/older".to_string(),
        user_id: "u1".to_string(),
    });
    let vm = page(
        database.signed_in_client(Identity::new("u1")),
        SyncOptions::default(),
    );
    vm.activate().await;
    assert_eq!(vm.snapshot().bookmarks.len(), 1);

    let (title, url) = docs();
    vm.set_draft_title(title);
    vm.set_draft_url(url);
    assert_eq!(vm.add_bookmark().await, MutationOutcome::Submitted);
    assert!(vm.draft().is_empty());

    // The change notification drives the reload.
    let state = wait_until(&vm, |s| s.bookmarks.len() == 2).await;
    let newest = &state.bookmarks[0];
    assert_eq!(newest.title, "Docs");
    assert_eq!(newest.url, "https://example.com/docs");
    assert!(state.bookmarks.iter().all(|b| b.created_at <= newest.created_at));

    let id = newest.id.clone();
    assert_eq!(vm.remove_bookmark(&id).await, MutationOutcome::Submitted);
    let state = wait_until(&vm, |s| s.bookmarks.len() == 1).await;
    assert!(state.bookmarks.iter().all(|b| b.id != id));

    // Removing it again is quiet
    assert_eq!(vm.remove_bookmark(&id).await, MutationOutcome::Submitted);
    vm.deactivate().await;
}

#[tokio::test]
async fn test_first_bookmark_scenario() {
    let database = MemoryDatabase::new("bookmarks");
    let vm = page(
        database.signed_in_client(Identity::new("u1")),
        SyncOptions::default(),
    );
    vm.activate().await;
    assert!(vm.snapshot().bookmarks.is_empty());

    let (title, url) = docs();
    vm.set_draft_title(title);
    vm.set_draft_url(url);
    vm.add_bookmark().await;

    let state = wait_until(&vm, |s| s.bookmarks.len() == 1).await;
    assert!(state.draft.is_empty());
    let id = state.bookmarks[0].id.clone();

    vm.remove_bookmark(&id).await;
    let state = wait_until(&vm, |s| s.bookmarks.is_empty()).await;
    assert_eq!(state.mode(), ViewMode::Authenticated);
    vm.deactivate().await;
}

#[tokio::test]
async fn test_second_session_follows_first() {
    let database = MemoryDatabase::new("bookmarks");
    let first = page(
        database.signed_in_client(Identity::new("u1")),
        SyncOptions::default(),
    );
    let second = page(
        database.signed_in_client(Identity::new("u1")),
        SyncOptions::default(),
    );
    first.activate().await;
    second.activate().await;

    let (title, url) = docs();
    first.set_draft_title(title);
    first.set_draft_url(url);
    assert_eq!(first.add_bookmark().await, MutationOutcome::Submitted);

    let state = wait_until(&second, |s| s.bookmarks.len() == 1).await;
    assert_eq!(state.bookmarks[0].title, "Docs");

    first.deactivate().await;
    second.deactivate().await;
    assert_eq!(database.subscriber_count(), 0);
}

#[tokio::test]
async fn test_other_users_rows_never_appear() {
    let database = MemoryDatabase::new("bookmarks");
    let mine = page(
        database.signed_in_client(Identity::new("u1")),
        SyncOptions::default(),
    );
    let theirs = page(
        database.signed_in_client(Identity::new("u2")),
        SyncOptions::default(),
    );
    mine.activate().await;
    theirs.activate().await;

    theirs.set_draft_title("Private");
    theirs.set_draft_url("https://example.com/private");
    theirs.add_bookmark().await;
    wait_until(&theirs, |s| s.bookmarks.len() == 1).await;

    // Unscoped channel: u1 re-fetched too, but sees none of u2's rows.
    assert!(mine.snapshot().bookmarks.is_empty());
    mine.deactivate().await;
    theirs.deactivate().await;
}

#[tokio::test]
async fn test_logout_then_login_again() {
    let database = MemoryDatabase::new("bookmarks");
    database.seed(NewBookmark {
        title: "Kept".to_string(),
        url: "https://example.com/kept".to_string(),
        user_id: "u1".to_string(),
    });
    let vm = page(
        database.signed_in_client(Identity::new("u1")),
        SyncOptions::default().with_scoped_channel(true),
    );
    vm.activate().await;
    assert_eq!(vm.snapshot().bookmarks.len(), 1);

    vm.logout().await;
    let state = vm.snapshot();
    assert_eq!(state.mode(), ViewMode::Unauthenticated);
    assert!(state.bookmarks.is_empty());
    assert_eq!(state.screen(), Screen::SignIn);
    assert_eq!(database.subscriber_count(), 0);

    assert_eq!(vm.login().await, ViewMode::Authenticated);
    assert_eq!(vm.snapshot().bookmarks.len(), 1);
    assert_eq!(database.subscriber_count(), 1);
    vm.deactivate().await;
}

#[tokio::test]
async fn test_optimistic_add_is_replaced_by_stored_row() {
    let database = MemoryDatabase::new("bookmarks");
    let vm = page(
        database.signed_in_client(Identity::new("u1")),
        SyncOptions::default().with_optimistic_updates(true),
    );
    vm.activate().await;

    let (title, url) = docs();
    vm.set_draft_title(title);
    vm.set_draft_url(url);
    vm.add_bookmark().await;

    let state = wait_until(&vm, |s| s.bookmarks.len() == 1 && !s.bookmarks[0].is_pending()).await;
    assert_eq!(state.bookmarks[0].title, "Docs");
    vm.deactivate().await;
}
