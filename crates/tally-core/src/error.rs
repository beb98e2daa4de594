//! Error types for ledger operations.

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors returned by the ledger guard and the subscription mirror.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// No verified identity was supplied.
    #[error("not authenticated")]
    Unauthenticated,

    /// The user record does not exist.
    #[error("user not found")]
    NotFound,

    /// The balance does not cover the requested amount.
    #[error("insufficient credits: balance={balance}")]
    InsufficientBalance {
        /// Current balance, for display.
        balance: i64,
    },

    /// The requested amount is zero or negative.
    #[error("invalid amount: {0}")]
    InvalidAmount(i64),

    /// The persistence layer failed. The detail is for server logs only.
    #[error("storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::NotFound => "not_found",
            Self::InsufficientBalance { .. } => "insufficient_credits",
            Self::InvalidAmount(_) => "invalid_amount",
            Self::Storage(_) => "storage_failure",
        }
    }
}
