//! Composition root: picks the backend and wires it into the view-model.

use std::sync::Arc;

use anyhow::{Context, Result};
use bookmarks_application::{BookmarkViewModel, SyncOptions};
use bookmarks_core::bookmark::NewBookmark;
use bookmarks_core::config::RootConfig;
use bookmarks_core::identity::Identity;
use bookmarks_infrastructure::supabase::AccessTokenSource;
use bookmarks_infrastructure::{
    BookmarkPaths, MemoryDatabase, PostgRestRepository, RealtimeFeed, SessionFile, SupabaseAuth,
    SupabaseClient,
};

pub struct AppBootstrap {
    pub view_model: Arc<BookmarkViewModel>,
}

/// Wires the hosted Supabase project described by `config`.
pub fn hosted(config: &RootConfig, paths: &BookmarkPaths) -> Result<AppBootstrap> {
    config
        .validate()
        .context("Supabase project is not configured; run with --demo to try the in-memory backend")?;

    let client = SupabaseClient::new(&config.backend)?;
    tracing::info!("[Bootstrap] Using Supabase project at {}", client.base_url());

    let auth = Arc::new(SupabaseAuth::new(
        client.clone(),
        config.auth.clone(),
        SessionFile::new(paths.session_file()),
    ));
    let tokens: Arc<dyn AccessTokenSource> = auth.clone();

    let repository = Arc::new(PostgRestRepository::new(
        client.clone(),
        tokens.clone(),
        config.backend.table.clone(),
    ));
    let feed = Arc::new(RealtimeFeed::new(&client, &config.sync, tokens)?);

    let view_model = Arc::new(BookmarkViewModel::new(
        auth,
        repository,
        feed,
        SyncOptions::from_config(config),
    ));
    tracing::info!("[Bootstrap] Hosted backend ready");

    Ok(AppBootstrap { view_model })
}

const DEMO_USER: &str = "demo-user";
const DEMO_EMAIL: &str = "demo@example.com";

/// Wires an in-memory backend with a few sample rows.
///
/// The demo account starts signed out; "signing in" completes immediately.
pub fn demo(config: &RootConfig) -> AppBootstrap {
    let database = MemoryDatabase::new(config.backend.table.clone());
    for (title, url) in [
        ("Rust Book", "https://doc.rust-lang.org/book/"),
        ("Supabase docs", "https://supabase.com/docs"),
        ("ratatui", "https://ratatui.rs"),
    ] {
        database.seed(NewBookmark {
            title: title.to_string(),
            url: url.to_string(),
            user_id: DEMO_USER.to_string(),
        });
    }
    // Belongs to someone else; must never show up.
    database.seed(NewBookmark {
        title: "Someone else's".to_string(),
        url: "https://example.com/private".to_string(),
        user_id: "other-user".to_string(),
    });

    let client = Arc::new(database.client(Identity::new(DEMO_USER).with_email(DEMO_EMAIL)));
    let view_model = Arc::new(BookmarkViewModel::new(
        client.clone(),
        client.clone(),
        client,
        SyncOptions::from_config(config),
    ));
    tracing::info!("[Bootstrap] Demo backend ready");

    AppBootstrap { view_model }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookmarks_core::view::ViewMode;

    #[test]
    fn test_hosted_requires_backend_settings() {
        let dir = tempfile::tempdir().unwrap();
        let paths = BookmarkPaths::with_config_dir(dir.path());
        let err = hosted(&RootConfig::default(), &paths).err().unwrap();
        assert!(format!("{:#}", err).contains("backend.url"));
    }

    #[test]
    fn test_hosted_wires_configured_project() {
        let dir = tempfile::tempdir().unwrap();
        let paths = BookmarkPaths::with_config_dir(dir.path());
        let mut config = RootConfig::default();
        config.backend.url = "https://project.supabase.co".to_string();
        config.backend.anon_key = "anon".to_string();

        let bootstrap = hosted(&config, &paths).unwrap();
        assert_eq!(bootstrap.view_model.mode(), ViewMode::Loading);
    }

    #[tokio::test]
    async fn test_demo_login_shows_only_own_rows() {
        let bootstrap = demo(&RootConfig::default());
        let vm = bootstrap.view_model;

        assert_eq!(vm.activate().await, ViewMode::Unauthenticated);
        assert_eq!(vm.login().await, ViewMode::Authenticated);

        let state = vm.snapshot();
        assert_eq!(state.bookmarks.len(), 3);
        assert!(state.bookmarks.iter().all(|b| b.user_id == DEMO_USER));
        assert_eq!(
            state.identity.as_ref().map(|i| i.display_name()),
            Some(DEMO_EMAIL)
        );
        vm.deactivate().await;
    }
}
