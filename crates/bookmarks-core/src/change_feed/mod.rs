//! Change-notification domain module.
//!
//! Describes row-change events on the bookmark table and the boundary to the
//! hosted publish/subscribe channel that delivers them.

mod feed;
mod model;

pub use feed::{ChangeFeed, Subscription, SubscriptionHandle};
pub use model::{ChangeEvent, ChangeFilter, ChangeKind, EventMask};
