//! Storage layer for tally.
//!
//! This crate provides persistent storage for users, credit ledger rows and
//! subscription mirrors. Three backends implement the [`Store`] trait:
//!
//! - [`MemoryStore`]: process-local, used for tests and single-node demos
//! - [`PgStore`]: PostgreSQL through `sqlx`
//! - `RocksStore`: embedded `RocksDB` (feature `rocksdb-backend`)
//!
//! # Atomic debits
//!
//! [`Store::debit_credits`] is the only way balances go down. Every backend
//! implements it as one conditional decrement: the sufficiency check and the
//! write happen in a single atomic step, so concurrent debits can never
//! overdraw a balance.
//!
//! # Example
//!
//! ```no_run
//! use tally_core::{User, UserId};
//! use tally_store::{MemoryStore, Store};
//!
//! # async fn example() -> tally_store::Result<()> {
//! let store = MemoryStore::new();
//! let user_id = UserId::new(1).unwrap();
//! store.create_user(&User::new(user_id, 100)).await?;
//!
//! let tx = store.debit_credits(user_id, 30, "report export").await?;
//! assert_eq!(tx.balance_after, 70);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod memory;
pub mod postgres;

#[cfg(feature = "rocksdb-backend")]
pub mod keys;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
#[cfg(feature = "rocksdb-backend")]
pub mod schema;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use postgres::PgStore;
#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksStore;

use async_trait::async_trait;
use tally_core::{CreditTransaction, Subscription, TransactionType, User, UserId};

/// The storage trait defining all database operations.
///
/// Implementations must make `debit_credits`, `add_credits` and
/// `upsert_subscription` atomic with respect to concurrent callers.
#[async_trait]
pub trait Store: Send + Sync {
    // =========================================================================
    // User Operations
    // =========================================================================

    /// Insert a user record if none exists for its id.
    ///
    /// Returns `false` when the user already existed; the stored record is
    /// left untouched in that case.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn create_user(&self, user: &User) -> Result<bool>;

    /// Insert a user and credit an opening grant in one atomic write.
    ///
    /// `grant` is added on top of `user.credits` and, when positive, recorded
    /// as a `grant` ledger row. Returns the stored user, or `None` when the
    /// user already existed (nothing is written in that case).
    ///
    /// # Errors
    ///
    /// - `StoreError::BalanceOverflow` if the opening balance does not fit.
    /// - Any database error; neither the user nor the ledger row is kept.
    async fn create_user_with_grant(
        &self,
        user: &User,
        grant: i64,
        description: &str,
    ) -> Result<Option<User>>;

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_user(&self, user_id: UserId) -> Result<Option<User>>;

    /// Resolve a billing-provider customer id to a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn find_user_by_stripe_customer(&self, customer_id: &str) -> Result<Option<UserId>>;

    // =========================================================================
    // Balance Operations
    // =========================================================================

    /// Debit `amount` credits if, and only if, the balance covers it.
    ///
    /// The check and the decrement are one atomic step. The ledger row is
    /// written in the same step and returned.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the user doesn't exist.
    /// - `StoreError::InsufficientCredits` if the balance is too low; nothing
    ///   is written.
    async fn debit_credits(
        &self,
        user_id: UserId,
        amount: i64,
        description: &str,
    ) -> Result<CreditTransaction>;

    /// Add credits to a user and record the ledger row atomically.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the user doesn't exist.
    /// - `StoreError::BalanceOverflow` if the new balance does not fit in an
    ///   `i64`; nothing is written.
    async fn add_credits(
        &self,
        user_id: UserId,
        amount: i64,
        transaction_type: TransactionType,
        description: &str,
    ) -> Result<CreditTransaction>;

    /// List ledger rows for a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_transactions_by_user(
        &self,
        user_id: UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>>;

    // =========================================================================
    // Subscription Operations
    // =========================================================================

    /// Get the mirrored subscription for a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_subscription(&self, user_id: UserId) -> Result<Option<Subscription>>;

    /// Insert or replace a user's subscription.
    ///
    /// The write is skipped when the stored row came from a newer provider
    /// event (`last_event_at` greater than the incoming one). Returns whether
    /// the row was written.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn upsert_subscription(&self, subscription: &Subscription) -> Result<bool>;
}
