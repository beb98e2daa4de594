//! Read side of the subscription mirror.
//!
//! Rows are written only by webhook ingest (see `handlers::webhooks`); this
//! module derives the paid/canceled flags callers actually gate on.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use tally_core::{LedgerError, SubscriptionView, UserId};
use tally_store::Store;

/// Reads mirrored subscription state.
#[derive(Clone)]
pub struct SubscriptionMirror {
    store: Arc<dyn Store>,
}

impl SubscriptionMirror {
    /// Create a mirror reader over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// The user's subscription as of now, or `None` if they never had one.
    pub async fn get_subscription(
        &self,
        user_id: UserId,
    ) -> Result<Option<SubscriptionView>, LedgerError> {
        self.get_subscription_at(user_id, Utc::now()).await
    }

    /// The user's subscription with `is_paid` evaluated at `now`.
    pub async fn get_subscription_at(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<SubscriptionView>, LedgerError> {
        let subscription = self.store.get_subscription(user_id).await.map_err(|e| {
            tracing::error!(user_id = %user_id, error = %e, "Subscription lookup failed");
            LedgerError::from(e)
        })?;

        Ok(subscription.map(|s| SubscriptionView::at(s, now)))
    }
}
