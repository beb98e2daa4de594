//! Column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// User records, keyed by big-endian `user_id`.
    pub const USERS: &str = "users";

    /// Credit transactions, keyed by `transaction_id` (ULID).
    pub const TRANSACTIONS: &str = "transactions";

    /// Index: transactions by user, keyed by `user_id || transaction_id`.
    /// Value is empty (index only).
    pub const TRANSACTIONS_BY_USER: &str = "transactions_by_user";

    /// Subscription mirrors, keyed by `user_id`.
    pub const SUBSCRIPTIONS: &str = "subscriptions";

    /// Index: billing-provider customer id to `user_id`.
    pub const STRIPE_CUSTOMERS: &str = "stripe_customers";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::USERS,
        cf::TRANSACTIONS,
        cf::TRANSACTIONS_BY_USER,
        cf::SUBSCRIPTIONS,
        cf::STRIPE_CUSTOMERS,
    ]
}
