//! Application state.

use std::sync::Arc;

use tally_store::Store;

use crate::config::ServiceConfig;
use crate::ledger::LedgerGuard;
use crate::notify::BalanceNotifier;
use crate::subscriptions::SubscriptionMirror;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<dyn Store>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Credit debits.
    pub ledger: LedgerGuard,

    /// Subscription reads.
    pub mirror: SubscriptionMirror,

    /// Balance-change fan-out.
    pub notifier: BalanceNotifier,
}

impl AppState {
    /// Create application state with a fresh notifier.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig) -> Self {
        Self::with_notifier(store, config, BalanceNotifier::default())
    }

    /// Create application state publishing through `notifier`.
    #[must_use]
    pub fn with_notifier(
        store: Arc<dyn Store>,
        config: ServiceConfig,
        notifier: BalanceNotifier,
    ) -> Self {
        if config.auth_jwt_secret.is_none() {
            tracing::warn!("AUTH_JWT_SECRET not configured - user endpoints will reject all tokens");
        }
        if config.stripe_webhook_secret.is_none() {
            tracing::warn!("Stripe webhook secret not configured - signatures will not be verified");
        }

        Self {
            ledger: LedgerGuard::new(Arc::clone(&store), notifier.clone()),
            mirror: SubscriptionMirror::new(Arc::clone(&store)),
            store,
            config,
            notifier,
        }
    }
}
