//! Adapters for a hosted Supabase project.
//!
//! - [`SupabaseAuth`]: GoTrue OAuth (PKCE) sign-in with a loopback redirect
//! - [`PostgRestRepository`]: the bookmark table through PostgREST
//! - [`RealtimeFeed`]: row changes through the Realtime websocket

mod auth;
mod client;
mod realtime;
mod rest;

pub use auth::{PkcePair, SupabaseAuth};
pub use client::SupabaseClient;
pub use realtime::RealtimeFeed;
pub use rest::PostgRestRepository;

use async_trait::async_trait;

/// Supplies the signed-in user's access token to the data adapters.
///
/// `None` means nobody is signed in; requests then go out with the anon key.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> Option<String>;
}
