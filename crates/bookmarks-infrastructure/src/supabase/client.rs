//! Shared HTTP plumbing for the Supabase adapters.

use std::time::Duration;

use bookmarks_core::config::BackendConfig;
use bookmarks_core::{BookmarkError, Result};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use url::Url;

/// Base URL, anon key and a pooled HTTP client.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct SupabaseClient {
    http: Client,
    base_url: Url,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let mut base_url = Url::parse(config.url.trim())
            .map_err(|e| BookmarkError::config(format!("backend.url '{}' is invalid: {}", config.url, e)))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| BookmarkError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            anon_key: config.anon_key.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn anon_key(&self) -> &str {
        &self.anon_key
    }

    /// Resolves `path` (no leading slash) against the project URL.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| BookmarkError::config(format!("Invalid endpoint '{}': {}", path, e)))
    }

    /// Starts a request with the `apikey` header and a bearer token.
    ///
    /// Without `bearer` the anon key is sent as the token.
    pub fn request(&self, method: Method, url: Url, bearer: Option<&str>) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer.unwrap_or(&self.anon_key))
    }
}

/// Sends `request`, mapping transport failures and non-2xx statuses.
///
/// 401/403 become [`BookmarkError::Auth`]; other statuses become
/// [`BookmarkError::DataAccess`] carrying the response body.
pub(crate) async fn send(request: RequestBuilder, context: &str) -> Result<Response> {
    send_mapped(request, context, status_error).await
}

/// Like [`send`] for GoTrue token grants, where an invalid or already used
/// refresh token / auth code comes back as 400.
pub(crate) async fn send_grant(request: RequestBuilder, context: &str) -> Result<Response> {
    send_mapped(request, context, grant_error).await
}

async fn send_mapped(
    request: RequestBuilder,
    context: &str,
    map_status: fn(StatusCode, &str, &str) -> BookmarkError,
) -> Result<Response> {
    let response = request
        .send()
        .await
        .map_err(|e| BookmarkError::network(format!("{}: {}", context, e)))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(map_status(status, context, &body))
}

pub(crate) fn status_error(status: StatusCode, context: &str, body: &str) -> BookmarkError {
    let message = format!("{}: HTTP {}: {}", context, status.as_u16(), body.trim());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BookmarkError::auth(message),
        _ => BookmarkError::data_access(message),
    }
}

pub(crate) fn grant_error(status: StatusCode, context: &str, body: &str) -> BookmarkError {
    if status == StatusCode::BAD_REQUEST {
        return BookmarkError::auth(format!("{}: grant rejected: {}", context, body.trim()));
    }
    status_error(status, context, body)
}

/// Reads a JSON body, mapping decode failures to a serialization error.
pub(crate) async fn json<T: serde::de::DeserializeOwned>(response: Response, context: &str) -> Result<T> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| BookmarkError::network(format!("{}: {}", context, e)))?;
    Ok(serde_json::from_slice(&bytes)?)
}
