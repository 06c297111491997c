//! GoTrue identity adapter.
//!
//! Sign-in uses the OAuth PKCE flow: the browser is sent to the provider with
//! a code challenge, the provider redirects to a loopback listener with an
//! auth code, and the code is exchanged for a session together with the
//! verifier. Sessions are persisted so that the next process resumes without
//! a browser round trip.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use bookmarks_core::config::AuthConfig;
use bookmarks_core::identity::{AuthSession, Identity, IdentityProvider};
use bookmarks_core::{BookmarkError, Result};
use chrono::{DateTime, TimeZone, Utc};
use rand::RngCore;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, RwLock, oneshot};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::AccessTokenSource;
use super::client::{SupabaseClient, json, send, send_grant};
use crate::storage::SessionFile;

/// PKCE verifier and its S256 challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

impl PkcePair {
    /// Fresh random verifier (32 bytes, base64url).
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::from_verifier(URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn from_verifier(verifier: impl Into<String>) -> Self {
        let verifier = verifier.into();
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        Self { verifier, challenge }
    }
}

/// Builds the provider redirect URL the browser is sent to.
pub(crate) fn authorize_url(base: &Url, provider: &str, redirect_to: &str, challenge: &str) -> Result<Url> {
    let mut url = base
        .join("auth/v1/authorize")
        .map_err(|e| BookmarkError::config(format!("Invalid authorize endpoint: {}", e)))?;
    url.query_pairs_mut()
        .append_pair("provider", provider)
        .append_pair("redirect_to", redirect_to)
        .append_pair("code_challenge", challenge)
        .append_pair("code_challenge_method", "s256");
    Ok(url)
}

/// What the redirect to the loopback listener carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CallbackOutcome {
    Code(String),
    Denied(String),
    /// Neither a code nor an error, e.g. a reload of the bare path
    Ignored,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CallbackQuery {
    code: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl CallbackQuery {
    pub(crate) fn into_outcome(self) -> CallbackOutcome {
        if let Some(code) = self.code.filter(|c| !c.is_empty()) {
            return CallbackOutcome::Code(code);
        }
        match self.error_description.or(self.error) {
            Some(reason) => CallbackOutcome::Denied(reason),
            None => CallbackOutcome::Ignored,
        }
    }
}

fn loopback_addr(redirect: &Url) -> Result<SocketAddr> {
    let host = redirect
        .host_str()
        .ok_or_else(|| BookmarkError::config(format!("Redirect URL '{}' has no host", redirect)))?;
    let port = redirect
        .port_or_known_default()
        .ok_or_else(|| BookmarkError::config(format!("Redirect URL '{}' has no port", redirect)))?;
    let host = if host == "localhost" { "127.0.0.1" } else { host };
    format!("{}:{}", host, port)
        .parse()
        .map_err(|e| BookmarkError::config(format!("Redirect host must be a loopback IP: {}", e)))
}

/// Hands the first code or denial to the waiting login.
type CallbackSlot = Arc<Mutex<Option<oneshot::Sender<CallbackOutcome>>>>;

fn page(message: &str) -> Html<String> {
    Html(format!(
        "<!doctype html><html><body><p>{}</p></body></html>",
        message
    ))
}

async fn callback_handler(
    State(slot): State<CallbackSlot>,
    Query(query): Query<CallbackQuery>,
) -> impl IntoResponse {
    let outcome = query.into_outcome();
    let (status, message) = match &outcome {
        CallbackOutcome::Code(_) => (StatusCode::OK, "Signed in. You can close this tab."),
        CallbackOutcome::Denied(_) => (StatusCode::OK, "Sign-in failed. You can close this tab."),
        CallbackOutcome::Ignored => {
            return (StatusCode::BAD_REQUEST, page("Missing auth code")).into_response();
        }
    };

    match slot.lock().await.take() {
        Some(sender) => {
            let _ = sender.send(outcome);
        }
        None => tracing::debug!("[SupabaseAuth] Ignoring repeated sign-in redirect"),
    }
    (status, page(message)).into_response()
}

/// Serves `callback_path` on `listener` until one request carries the auth
/// code or a denial. Other paths get a 404; connections are served
/// concurrently, so idle browser preconnects do not hold up the redirect.
async fn wait_for_callback(listener: TcpListener, callback_path: &str) -> Result<String> {
    let (sender, receiver) = oneshot::channel();
    let slot: CallbackSlot = Arc::new(Mutex::new(Some(sender)));
    let app = Router::new()
        .route(callback_path, get(callback_handler))
        .with_state(slot);

    // Stops the server however this future ends, timeouts included.
    let shutdown = CancellationToken::new();
    let _stop_server = shutdown.clone().drop_guard();
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
        {
            tracing::warn!("[SupabaseAuth] Sign-in listener failed: {}", e);
        }
    });

    match receiver.await {
        Ok(CallbackOutcome::Code(code)) => {
            tracing::debug!("[SupabaseAuth] Received auth code");
            Ok(code)
        }
        Ok(CallbackOutcome::Denied(reason)) => Err(BookmarkError::auth(format!(
            "Provider denied sign-in: {}",
            reason
        ))),
        Ok(CallbackOutcome::Ignored) | Err(_) => {
            Err(BookmarkError::auth("Sign-in listener stopped before the redirect arrived"))
        }
    }
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl From<UserResponse> for Identity {
    fn from(user: UserResponse) -> Self {
        Identity {
            id: user.id,
            email: user.email.filter(|e| !e.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    /// Unix seconds
    #[serde(default)]
    expires_at: Option<i64>,
    user: UserResponse,
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> AuthSession {
        let expires_at = match (self.expires_at, self.expires_in) {
            (Some(at), _) => Utc.timestamp_opt(at, 0).single(),
            (None, Some(secs)) => Some(now + chrono::Duration::seconds(secs)),
            (None, None) => None,
        };
        AuthSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            identity: self.user.into(),
        }
    }
}

#[derive(Serialize)]
struct PkceGrant<'a> {
    auth_code: &'a str,
    code_verifier: &'a str,
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

/// [`IdentityProvider`] backed by GoTrue.
pub struct SupabaseAuth {
    client: SupabaseClient,
    config: AuthConfig,
    session_file: SessionFile,
    session: RwLock<Option<AuthSession>>,
    /// Serializes refreshes; refresh tokens are single use.
    refresh_lock: Mutex<()>,
}

impl SupabaseAuth {
    pub fn new(client: SupabaseClient, config: AuthConfig, session_file: SessionFile) -> Self {
        Self {
            client,
            config,
            session_file,
            session: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Session in memory, else the persisted one.
    async fn stored_session(&self) -> Result<Option<AuthSession>> {
        if let Some(session) = self.session.read().await.clone() {
            return Ok(Some(session));
        }
        let loaded = self.session_file.load()?;
        if loaded.is_some() {
            *self.session.write().await = loaded.clone();
        }
        Ok(loaded)
    }

    async fn remember(&self, session: AuthSession) -> Result<()> {
        self.session_file.save(&session)?;
        *self.session.write().await = Some(session);
        Ok(())
    }

    async fn forget(&self) -> Result<Option<AuthSession>> {
        let previous = self.session.write().await.take();
        self.session_file.clear()?;
        Ok(previous)
    }

    /// Stored session with a usable access token, refreshing if needed.
    ///
    /// A refresh the server rejects clears the stored session.
    async fn valid_session(&self) -> Result<Option<AuthSession>> {
        let Some(session) = self.stored_session().await? else {
            return Ok(None);
        };
        if !session.is_expired_at(Utc::now()) {
            return Ok(Some(session));
        }

        let _guard = self.refresh_lock.lock().await;
        // Another caller may have refreshed while we waited.
        let Some(session) = self.stored_session().await? else {
            return Ok(None);
        };
        if !session.is_expired_at(Utc::now()) {
            return Ok(Some(session));
        }

        tracing::debug!("[SupabaseAuth] Access token expired, refreshing");
        match self.refresh(&session.refresh_token).await {
            Ok(refreshed) => {
                self.remember(refreshed.clone()).await?;
                Ok(Some(refreshed))
            }
            // Outages keep the stored refresh token for the next attempt.
            Err(e) if e.is_auth() => {
                tracing::info!("[SupabaseAuth] Refresh rejected, signing out locally: {}", e);
                self.forget().await?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession> {
        let mut url = self.client.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "refresh_token");
        let request = self
            .client
            .request(Method::POST, url, None)
            .json(&RefreshGrant { refresh_token });
        let response = send_grant(request, "refresh session").await?;
        let token: TokenResponse = json(response, "refresh session").await?;
        Ok(token.into_session(Utc::now()))
    }

    async fn exchange_code(&self, code: &str, verifier: &str) -> Result<AuthSession> {
        let mut url = self.client.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "pkce");
        let request = self.client.request(Method::POST, url, None).json(&PkceGrant {
            auth_code: code,
            code_verifier: verifier,
        });
        let response = send_grant(request, "exchange auth code").await?;
        let token: TokenResponse = json(response, "exchange auth code").await?;
        Ok(token.into_session(Utc::now()))
    }

    async fn fetch_user(&self, access_token: &str) -> Result<Identity> {
        let url = self.client.endpoint("auth/v1/user")?;
        let request = self.client.request(Method::GET, url, Some(access_token));
        let response = send(request, "fetch user").await?;
        let user: UserResponse = json(response, "fetch user").await?;
        Ok(user.into())
    }
}

#[async_trait]
impl IdentityProvider for SupabaseAuth {
    async fn current_session(&self) -> Result<Option<Identity>> {
        let Some(mut session) = self.valid_session().await? else {
            return Ok(None);
        };

        match self.fetch_user(&session.access_token).await {
            Ok(identity) => {
                if identity != session.identity {
                    session.identity = identity.clone();
                    self.remember(session).await?;
                }
                Ok(Some(identity))
            }
            Err(e) if e.is_auth() => {
                tracing::info!("[SupabaseAuth] Stored session no longer accepted: {}", e);
                self.forget().await?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn begin_oauth_login(&self, return_to: &str) -> Result<()> {
        let redirect = Url::parse(return_to)
            .map_err(|e| BookmarkError::config(format!("Invalid return address '{}': {}", return_to, e)))?;
        let addr = loopback_addr(&redirect)?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| BookmarkError::auth(format!("Cannot listen on {} for the sign-in redirect: {}", addr, e)))?;

        let pkce = PkcePair::generate();
        let authorize = authorize_url(
            self.client.base_url(),
            &self.config.provider,
            return_to,
            &pkce.challenge,
        )?;

        tracing::info!(
            "[SupabaseAuth] Opening browser for {} sign-in, waiting on {}",
            self.config.provider,
            addr
        );
        if let Err(e) = open::that_detached(authorize.as_str()) {
            tracing::warn!(
                "[SupabaseAuth] Could not open a browser ({}); open this URL manually: {}",
                e,
                authorize
            );
        }

        let wait = Duration::from_secs(self.config.login_timeout_secs);
        let code = tokio::time::timeout(wait, wait_for_callback(listener, redirect.path()))
            .await
            .map_err(|_| BookmarkError::auth("Timed out waiting for the sign-in redirect"))??;

        let session = self.exchange_code(&code, &pkce.verifier).await?;
        tracing::info!("[SupabaseAuth] Signed in as {}", session.identity.id);
        self.remember(session).await
    }

    async fn end_session(&self) -> Result<()> {
        let Some(session) = self.forget().await? else {
            return Ok(());
        };

        let url = self.client.endpoint("auth/v1/logout")?;
        let request = self
            .client
            .request(Method::POST, url, Some(&session.access_token));
        match send(request, "sign out").await {
            Ok(_) => Ok(()),
            // Already invalid on the server side
            Err(e) if e.is_auth() => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl AccessTokenSource for SupabaseAuth {
    async fn access_token(&self) -> Option<String> {
        match self.valid_session().await {
            Ok(session) => session.map(|s| s.access_token),
            Err(e) => {
                tracing::warn!("[SupabaseAuth] No usable access token: {}", e);
                None
            }
        }
    }
}
