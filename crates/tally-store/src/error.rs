//! Error types for tally storage.

use tally_core::LedgerError;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("not found")]
    NotFound,

    /// The conditional decrement found a balance that does not cover the debit.
    #[error("insufficient credits: balance={balance}, required={required}")]
    InsufficientCredits {
        /// Balance observed by the failed conditional update.
        balance: i64,
        /// Requested debit.
        required: i64,
    },

    /// The new balance does not fit in an `i64`; nothing was written.
    #[error("balance overflow")]
    BalanceOverflow,
}

/// PostgreSQL `numeric_value_out_of_range`.
const PG_NUMERIC_OUT_OF_RANGE: &str = "22003";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.code().as_deref() == Some(PG_NUMERIC_OUT_OF_RANGE) {
                return Self::BalanceOverflow;
            }
        }
        Self::Database(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound,
            StoreError::InsufficientCredits { balance, .. } => Self::InsufficientBalance { balance },
            StoreError::BalanceOverflow => Self::Storage("balance overflow".into()),
            StoreError::Database(msg) | StoreError::Serialization(msg) => Self::Storage(msg),
        }
    }
}
