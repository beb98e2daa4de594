//! The ledger guard: authenticated, sufficiency-checked credit debits.
//!
//! The guard itself holds no locks. Overdraft protection comes entirely from
//! [`Store::debit_credits`], which every backend implements as one
//! conditional decrement.

use std::sync::Arc;

use tally_core::{ConsumeResult, LedgerError, UserId};
use tally_store::Store;

use crate::notify::BalanceNotifier;

/// Description recorded on ledger rows written by [`LedgerGuard::consume`].
pub const CONSUME_DESCRIPTION: &str = "Credits consumed";

/// Applies credit debits on behalf of verified users.
#[derive(Clone)]
pub struct LedgerGuard {
    store: Arc<dyn Store>,
    notifier: BalanceNotifier,
}

impl LedgerGuard {
    /// Create a guard over `store`, announcing changes through `notifier`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, notifier: BalanceNotifier) -> Self {
        Self { store, notifier }
    }

    /// Debit `amount` credits from `principal`'s balance.
    ///
    /// Returns the balance after the debit. A missing principal is rejected
    /// before storage is touched, as is a non-positive amount.
    pub async fn consume(
        &self,
        principal: Option<UserId>,
        amount: i64,
    ) -> Result<i64, LedgerError> {
        let user_id = principal.ok_or(LedgerError::Unauthenticated)?;

        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let result = self
            .store
            .debit_credits(user_id, amount, CONSUME_DESCRIPTION)
            .await
            .map_err(LedgerError::from);

        let tx = match result {
            Ok(tx) => tx,
            Err(LedgerError::Storage(detail)) => {
                tracing::error!(user_id = %user_id, amount, error = %detail, "Credit debit failed");
                return Err(LedgerError::Storage(detail));
            }
            Err(e) => {
                tracing::debug!(user_id = %user_id, amount, code = e.code(), "Credit debit rejected");
                return Err(e);
            }
        };

        tracing::info!(
            user_id = %user_id,
            amount,
            balance = tx.balance_after,
            transaction_id = %tx.id,
            "Credits consumed"
        );

        self.notifier.publish(user_id, tx.balance_after);

        Ok(tx.balance_after)
    }

    /// [`consume`](Self::consume), folded into the uniform result shape.
    pub async fn consume_result(&self, principal: Option<UserId>, amount: i64) -> ConsumeResult {
        ConsumeResult::from(self.consume(principal, amount).await)
    }

    /// Current balance of `principal`.
    pub async fn balance(&self, principal: Option<UserId>) -> Result<i64, LedgerError> {
        let user_id = principal.ok_or(LedgerError::Unauthenticated)?;

        let user = self
            .store
            .get_user(user_id)
            .await
            .map_err(|e| {
                tracing::error!(user_id = %user_id, error = %e, "Balance lookup failed");
                LedgerError::from(e)
            })?
            .ok_or(LedgerError::NotFound)?;

        Ok(user.credits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::User;
    use tally_store::MemoryStore;

    fn user(id: i64) -> UserId {
        UserId::new(id).unwrap()
    }

    async fn guard_with(balance: i64) -> (LedgerGuard, Arc<MemoryStore>, BalanceNotifier) {
        let store = Arc::new(MemoryStore::new());
        store.create_user(&User::new(user(1), balance)).await.unwrap();
        let notifier = BalanceNotifier::default();
        let guard = LedgerGuard::new(store.clone(), notifier.clone());
        (guard, store, notifier)
    }

    #[tokio::test]
    async fn exact_balance_is_consumed() {
        let (guard, _, _) = guard_with(10).await;

        let result = guard.consume_result(Some(user(1)), 10).await;
        assert!(result.success);
        assert_eq!(result.credits, Some(0));
    }

    #[tokio::test]
    async fn insufficient_balance_reports_current_balance() {
        let (guard, store, _) = guard_with(5).await;

        let err = guard.consume(Some(user(1)), 10).await.unwrap_err();
        assert_eq!(err, LedgerError::InsufficientBalance { balance: 5 });

        let result = ConsumeResult::from(&err);
        assert!(!result.success);
        assert!(result.message.to_lowercase().contains("insufficient"));
        assert_eq!(result.credits, Some(5));

        let stored = store.get_user(user(1)).await.unwrap().unwrap();
        assert_eq!(stored.credits, 5);
    }

    #[tokio::test]
    async fn missing_user_is_not_found() {
        let (guard, _, _) = guard_with(10).await;

        let result = guard.consume_result(Some(user(99)), 1).await;
        assert!(!result.success);
        assert_eq!(result.message, "User not found");
        assert_eq!(result.credits, None);
    }

    #[tokio::test]
    async fn unauthenticated_never_touches_balance() {
        let (guard, store, _) = guard_with(10).await;

        for amount in [-1, 0, 1, 10, 1000] {
            let err = guard.consume(None, amount).await.unwrap_err();
            assert_eq!(err, LedgerError::Unauthenticated);
        }

        let stored = store.get_user(user(1)).await.unwrap().unwrap();
        assert_eq!(stored.credits, 10);
        assert!(store
            .list_transactions_by_user(user(1), 10, 0)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn non_positive_amounts_are_rejected() {
        let (guard, store, _) = guard_with(10).await;

        assert_eq!(
            guard.consume(Some(user(1)), 0).await.unwrap_err(),
            LedgerError::InvalidAmount(0)
        );
        assert_eq!(
            guard.consume(Some(user(1)), -3).await.unwrap_err(),
            LedgerError::InvalidAmount(-3)
        );
        assert_eq!(store.get_user(user(1)).await.unwrap().unwrap().credits, 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_consumes_succeed_floor_times() {
        let (guard, store, _) = guard_with(100).await;

        let handles: Vec<_> = (0..25)
            .map(|_| {
                let guard = guard.clone();
                tokio::spawn(async move { guard.consume(Some(user(1)), 7).await })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(balance) => {
                    assert!(balance >= 0);
                    successes += 1;
                }
                Err(e) => assert!(matches!(e, LedgerError::InsufficientBalance { .. })),
            }
        }

        assert_eq!(successes, 100 / 7);
        let stored = store.get_user(user(1)).await.unwrap().unwrap();
        assert_eq!(stored.credits, 100 - 7 * (100 / 7));
    }

    #[tokio::test]
    async fn success_publishes_balance_change() {
        let (guard, _, notifier) = guard_with(10).await;
        let mut rx = notifier.subscribe();

        guard.consume(Some(user(1)), 4).await.unwrap();

        let event = rx.try_recv().unwrap();
        assert_eq!(event.user_id, user(1));
        assert_eq!(event.credits, 6);
    }

    #[tokio::test]
    async fn failure_publishes_nothing() {
        let (guard, _, notifier) = guard_with(3).await;
        let mut rx = notifier.subscribe();

        guard.consume(Some(user(1)), 4).await.unwrap_err();
        guard.consume(None, 1).await.unwrap_err();

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn balance_requires_principal() {
        let (guard, _, _) = guard_with(12).await;

        assert_eq!(guard.balance(Some(user(1))).await, Ok(12));
        assert_eq!(guard.balance(None).await, Err(LedgerError::Unauthenticated));
        assert_eq!(guard.balance(Some(user(2))).await, Err(LedgerError::NotFound));
    }
}
