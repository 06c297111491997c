//! Configuration model.
//!
//! Mirrors `config.toml`:
//!
//! ```toml
//! [backend]
//! url = "https://<project>.supabase.co"
//! anon_key = "<public anon key>"
//! table = "bookmarks"
//!
//! [auth]
//! provider = "google"
//! redirect_port = 54321
//!
//! [sync]
//! channel = "realtime-bookmarks"
//! scope_channel_to_owner = false
//! optimistic_updates = false
//!
//! [logging]
//! level = "info"
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{BookmarkError, Result};

/// Root of `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RootConfig {
    /// Checks the settings that have no usable default.
    pub fn validate(&self) -> Result<()> {
        if self.backend.url.trim().is_empty() {
            return Err(BookmarkError::config(
                "backend.url is not set (config.toml or SUPABASE_URL)",
            ));
        }
        if self.backend.anon_key.trim().is_empty() {
            return Err(BookmarkError::config(
                "backend.anon_key is not set (config.toml or SUPABASE_ANON_KEY)",
            ));
        }
        if self.backend.table.trim().is_empty() {
            return Err(BookmarkError::config("backend.table must not be empty"));
        }
        Ok(())
    }
}

/// Hosted project settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Project base URL, e.g. `https://abcd.supabase.co`
    #[serde(default)]
    pub url: String,
    /// Public anon key sent as `apikey`
    #[serde(default)]
    pub anon_key: String,
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_table() -> String {
    "bookmarks".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            schema: default_schema(),
            table: default_table(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// OAuth login settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// OAuth provider name as known to the identity service
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Loopback port the provider redirects back to
    #[serde(default = "default_redirect_port")]
    pub redirect_port: u16,
    /// How long to wait for the browser to come back
    #[serde(default = "default_login_timeout_secs")]
    pub login_timeout_secs: u64,
}

fn default_provider() -> String {
    "google".to_string()
}

fn default_redirect_port() -> u16 {
    54321
}

fn default_login_timeout_secs() -> u64 {
    300
}

impl AuthConfig {
    /// The loopback return address handed to the provider.
    pub fn redirect_url(&self) -> String {
        format!("http://127.0.0.1:{}/callback", self.redirect_port)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            redirect_port: default_redirect_port(),
            login_timeout_secs: default_login_timeout_secs(),
        }
    }
}

/// Change-notification and list-update behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Realtime channel name
    #[serde(default = "default_channel")]
    pub channel: String,
    /// Scope the channel to the signed-in owner's rows.
    /// Off: every row change in the table triggers a re-fetch in every client.
    #[serde(default)]
    pub scope_channel_to_owner: bool,
    /// Apply add/remove locally before the store confirms them
    #[serde(default)]
    pub optimistic_updates: bool,
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
}

fn default_channel() -> String {
    "realtime-bookmarks".to_string()
}

fn default_heartbeat_interval_secs() -> u64 {
    25
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            scope_channel_to_owner: false,
            optimistic_updates: false,
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` env-filter directive
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RootConfig::default();
        assert_eq!(config.backend.table, "bookmarks");
        assert_eq!(config.backend.schema, "public");
        assert_eq!(config.auth.provider, "google");
        assert_eq!(config.sync.channel, "realtime-bookmarks");
        assert!(!config.sync.scope_channel_to_owner);
        assert!(!config.sync.optimistic_updates);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let toml_str = r#"
            [backend]
            url = "https://abcd.supabase.co"
            anon_key = "anon"

            [sync]
            optimistic_updates = true
        "#;
        let config: RootConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.backend.url, "https://abcd.supabase.co");
        assert_eq!(config.backend.table, "bookmarks");
        assert!(config.sync.optimistic_updates);
        assert_eq!(config.sync.heartbeat_interval_secs, 25);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_backend() {
        let err = RootConfig::default().validate().unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_redirect_url() {
        let auth = AuthConfig {
            redirect_port: 8080,
            ..Default::default()
        };
        assert_eq!(auth.redirect_url(), "http://127.0.0.1:8080/callback");
    }
}
