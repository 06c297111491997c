//! View-model options derived from configuration.

use bookmarks_core::config::RootConfig;

/// Settings the view-model needs from `config.toml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    pub schema: String,
    pub table: String,
    /// Where the identity provider sends the browser back to
    pub return_to: String,
    /// Scope the change channel to the signed-in owner
    pub scope_channel_to_owner: bool,
    /// Apply add/remove locally before the store confirms them
    pub optimistic_updates: bool,
}

impl SyncOptions {
    pub fn from_config(config: &RootConfig) -> Self {
        Self {
            schema: config.backend.schema.clone(),
            table: config.backend.table.clone(),
            return_to: config.auth.redirect_url(),
            scope_channel_to_owner: config.sync.scope_channel_to_owner,
            optimistic_updates: config.sync.optimistic_updates,
        }
    }

    pub fn with_optimistic_updates(mut self, enabled: bool) -> Self {
        self.optimistic_updates = enabled;
        self
    }

    pub fn with_scoped_channel(mut self, enabled: bool) -> Self {
        self.scope_channel_to_owner = enabled;
        self
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::from_config(&RootConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_default_config() {
        let options = SyncOptions::default();
        assert_eq!(options.table, "bookmarks");
        assert_eq!(options.schema, "public");
        assert_eq!(options.return_to, "http://127.0.0.1:54321/callback");
        assert!(!options.optimistic_updates);
        assert!(!options.scope_channel_to_owner);
    }
}
