//! Balance-change notifications.
//!
//! After a balance changes, cached views of it (the rendered dashboard, the
//! billing page) are stale. The service publishes a [`BalanceChanged`] event
//! naming the affected user and the paths to revalidate; whoever renders
//! those views subscribes. Publishing never blocks and never fails the
//! balance change that triggered it.

use serde::Serialize;
use tokio::sync::broadcast;

use tally_core::UserId;

/// Paths whose rendered output depends on a user's balance.
pub const REVALIDATE_PATHS: &[&str] = &["/dashboard", "/dashboard/billing"];

/// Buffered events per subscriber before the slowest one starts lagging.
pub const NOTIFICATION_CHANNEL_CAPACITY: usize = 1024;

/// A user's balance changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceChanged {
    /// Whose balance changed.
    pub user_id: UserId,
    /// The balance after the change.
    pub credits: i64,
    /// Paths to revalidate.
    pub paths: Vec<String>,
}

/// Fan-out publisher for [`BalanceChanged`] events.
#[derive(Debug, Clone)]
pub struct BalanceNotifier {
    sender: broadcast::Sender<BalanceChanged>,
}

impl BalanceNotifier {
    /// Create a notifier with room for `capacity` pending events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BalanceChanged> {
        self.sender.subscribe()
    }

    /// Publish a balance change. Returns how many subscribers received it.
    pub fn publish(&self, user_id: UserId, credits: i64) -> usize {
        let event = BalanceChanged {
            user_id,
            credits,
            paths: REVALIDATE_PATHS.iter().map(|p| (*p).to_string()).collect(),
        };

        if let Ok(receivers) = self.sender.send(event) {
            receivers
        } else {
            tracing::trace!(user_id = %user_id, "No balance subscribers");
            0
        }
    }
}

impl Default for BalanceNotifier {
    fn default() -> Self {
        Self::new(NOTIFICATION_CHANNEL_CAPACITY)
    }
}
