//! Identity domain models.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Seconds before the recorded expiry at which a session is already treated
/// as expired, so a request never goes out with a token about to lapse.
const EXPIRY_MARGIN_SECS: i64 = 30;

/// The authenticated user as seen by the view-model.
///
/// Only `id` is load-bearing: it is the owning-identity reference written into
/// every bookmark and the value every read is filtered by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable identifier assigned by the identity provider
    pub id: String,
    /// Email address, if the provider shared one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Label used in the header of the authenticated screen.
    pub fn display_name(&self) -> &str {
        self.email.as_deref().unwrap_or(&self.id)
    }
}

/// Provider-issued tokens for a signed-in identity.
///
/// Kept by identity adapters so that a later process can resume silently.
/// The view-model never sees the tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    /// Absolute expiry of `access_token`; `None` means the provider did not say
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub identity: Identity,
}

impl AuthSession {
    /// Whether the access token must be refreshed before use at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at - Duration::seconds(EXPIRY_MARGIN_SECS) <= now,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(expires_at: Option<DateTime<Utc>>) -> AuthSession {
        AuthSession {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at,
            identity: Identity::new("u1"),
        }
    }

    #[test]
    fn test_display_name_prefers_email() {
        let identity = Identity::new("u1").with_email("u1@example.com");
        assert_eq!(identity.display_name(), "u1@example.com");
        assert_eq!(Identity::new("u1").display_name(), "u1");
    }

    #[test]
    fn test_expiry_uses_margin() {
        let now = Utc::now();
        assert!(session(Some(now + Duration::seconds(10))).is_expired_at(now));
        assert!(!session(Some(now + Duration::minutes(10))).is_expired_at(now));
        assert!(!session(None).is_expired_at(now));
    }

    #[test]
    fn test_session_json_without_expiry() {
        let json = r#"{
            "access_token": "a",
            "refresh_token": "r",
            "identity": { "id": "u1" }
        }"#;
        let parsed: AuthSession = serde_json::from_str(json).unwrap();
        assert!(parsed.expires_at.is_none());
        assert_eq!(parsed.identity, Identity::new("u1"));
    }
}
