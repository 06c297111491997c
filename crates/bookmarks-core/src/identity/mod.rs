//! Identity domain module.
//!
//! This module contains the authenticated identity model and the identity
//! provider boundary.
//!
//! # Module Structure
//!
//! - `model`: Identity and persisted provider session
//! - `provider`: IdentityProvider trait
//!
//! # Usage
//!
//! ```ignore
//! use bookmarks_core::identity::{Identity, IdentityProvider};
//! ```

mod model;
mod provider;

// Re-export public API
pub use model::{AuthSession, Identity};
pub use provider::IdentityProvider;
