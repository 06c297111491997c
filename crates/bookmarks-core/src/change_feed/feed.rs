//! Change feed trait and subscription handle.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::model::{ChangeEvent, ChangeFilter};
use crate::error::Result;

/// Opaque handle of an open subscription.
///
/// Deliberately neither `Clone` nor `Copy`: [`ChangeFeed::unsubscribe`] takes
/// it by value, so a subscription can be released at most once.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// An open subscription: its handle plus the stream of matching events.
///
/// The receiver yields `None` once the feed side has closed (unsubscribe or
/// lost connection).
#[derive(Debug)]
pub struct Subscription {
    pub handle: SubscriptionHandle,
    pub events: mpsc::UnboundedReceiver<ChangeEvent>,
}

/// Boundary to the hosted change-notification channel.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Opens a standing subscription for `filter`.
    async fn subscribe(&self, filter: ChangeFilter) -> Result<Subscription>;

    /// Releases a subscription. Its event receiver is closed afterwards.
    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<()>;
}
