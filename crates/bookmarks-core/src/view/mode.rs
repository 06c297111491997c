//! View mode.

use serde::{Deserialize, Serialize};

/// Mutually exclusive rendering state.
///
/// `Loading → {Unauthenticated, Authenticated}`, then
/// `Unauthenticated ⇄ Authenticated` via login and logout. There is no
/// terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewMode {
    /// The session has not been resolved yet.
    Loading,
    /// Resolved, nobody signed in.
    Unauthenticated,
    /// Resolved with a present identity.
    Authenticated,
}

impl ViewMode {
    /// Derives the mode from the two facts it depends on.
    pub fn derive(resolved: bool, present: bool) -> Self {
        match (resolved, present) {
            (false, _) => ViewMode::Loading,
            (true, false) => ViewMode::Unauthenticated,
            (true, true) => ViewMode::Authenticated,
        }
    }
}
