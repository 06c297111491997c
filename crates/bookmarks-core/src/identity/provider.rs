//! Identity provider trait.

use async_trait::async_trait;

use super::model::Identity;
use crate::error::Result;

/// Boundary to the external identity provider.
///
/// Implementations own whatever token storage the provider needs; callers only
/// ever see the resolved [`Identity`].
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns the identity of a currently valid session, if any.
    ///
    /// An implementation may refresh expired tokens here. `Ok(None)` means
    /// nobody is signed in.
    async fn current_session(&self) -> Result<Option<Identity>>;

    /// Runs the redirect-based OAuth handshake.
    ///
    /// `return_to` is the address the provider redirects back to. The future
    /// resolves once the return trip has completed (or failed); callers then
    /// resolve the session again.
    async fn begin_oauth_login(&self, return_to: &str) -> Result<()>;

    /// Invalidates the remote session and forgets any local tokens.
    async fn end_session(&self) -> Result<()>;
}
