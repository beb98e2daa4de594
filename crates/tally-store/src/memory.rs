//! In-memory storage implementation.
//!
//! All state sits behind one lock, so every operation is trivially atomic.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use tally_core::{CreditTransaction, Subscription, TransactionType, User, UserId};

use crate::error::{Result, StoreError};
use crate::Store;

#[derive(Default)]
struct MemoryState {
    users: HashMap<UserId, User>,
    // Append order is chronological order.
    transactions: Vec<CreditTransaction>,
    subscriptions: HashMap<UserId, Subscription>,
}

/// Process-local store.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryState>> {
        self.state
            .read()
            .map_err(|_| StoreError::Database("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryState>> {
        self.state
            .write()
            .map_err(|_| StoreError::Database("memory store lock poisoned".into()))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: &User) -> Result<bool> {
        let mut state = self.write()?;
        if state.users.contains_key(&user.id) {
            return Ok(false);
        }
        state.users.insert(user.id, user.clone());
        Ok(true)
    }

    async fn create_user_with_grant(
        &self,
        user: &User,
        grant: i64,
        description: &str,
    ) -> Result<Option<User>> {
        let mut state = self.write()?;
        if state.users.contains_key(&user.id) {
            return Ok(None);
        }

        let mut user = user.clone();
        user.credits = user
            .credits
            .checked_add(grant)
            .ok_or(StoreError::BalanceOverflow)?;

        if grant > 0 {
            state.transactions.push(CreditTransaction::credit(
                user.id,
                grant,
                TransactionType::Grant,
                user.credits,
                description.to_string(),
            ));
        }
        state.users.insert(user.id, user.clone());
        Ok(Some(user))
    }

    async fn get_user(&self, user_id: UserId) -> Result<Option<User>> {
        Ok(self.read()?.users.get(&user_id).cloned())
    }

    async fn find_user_by_stripe_customer(&self, customer_id: &str) -> Result<Option<UserId>> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.stripe_customer_id.as_deref() == Some(customer_id))
            .map(|u| u.id))
    }

    async fn debit_credits(
        &self,
        user_id: UserId,
        amount: i64,
        description: &str,
    ) -> Result<CreditTransaction> {
        let mut state = self.write()?;
        let user = state.users.get_mut(&user_id).ok_or(StoreError::NotFound)?;

        if user.credits < amount {
            return Err(StoreError::InsufficientCredits {
                balance: user.credits,
                required: amount,
            });
        }

        user.credits = user
            .credits
            .checked_sub(amount)
            .ok_or(StoreError::BalanceOverflow)?;
        user.updated_at = Utc::now();

        let tx = CreditTransaction::debit(user_id, amount, user.credits, description.to_string());
        state.transactions.push(tx.clone());
        Ok(tx)
    }

    async fn add_credits(
        &self,
        user_id: UserId,
        amount: i64,
        transaction_type: TransactionType,
        description: &str,
    ) -> Result<CreditTransaction> {
        let mut state = self.write()?;
        let user = state.users.get_mut(&user_id).ok_or(StoreError::NotFound)?;

        user.credits = user
            .credits
            .checked_add(amount)
            .ok_or(StoreError::BalanceOverflow)?;
        user.updated_at = Utc::now();

        let tx = CreditTransaction::credit(
            user_id,
            amount,
            transaction_type,
            user.credits,
            description.to_string(),
        );
        state.transactions.push(tx.clone());
        Ok(tx)
    }

    async fn list_transactions_by_user(
        &self,
        user_id: UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>> {
        Ok(self
            .read()?
            .transactions
            .iter()
            .rev()
            .filter(|tx| tx.user_id == user_id)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_subscription(&self, user_id: UserId) -> Result<Option<Subscription>> {
        Ok(self.read()?.subscriptions.get(&user_id).cloned())
    }

    async fn upsert_subscription(&self, subscription: &Subscription) -> Result<bool> {
        let mut state = self.write()?;
        if let Some(existing) = state.subscriptions.get(&subscription.user_id) {
            if !existing.accepts_event_at(subscription.last_event_at) {
                return Ok(false);
            }
        }
        state
            .subscriptions
            .insert(subscription.user_id, subscription.clone());
        Ok(true)
    }
}
