//! The uniform result shape returned to callers of `consume`.

use serde::{Deserialize, Serialize};

use crate::LedgerError;

/// Outward result of a credit debit.
///
/// Every ledger outcome, success or failure, converts into this shape so the
/// caller never has to handle an error type from the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumeResult {
    /// Whether the debit was applied.
    pub success: bool,

    /// Human-readable message for display.
    pub message: String,

    /// The balance after the debit, the current balance on insufficient
    /// funds, or `None` when no balance is known.
    pub credits: Option<i64>,
}

impl ConsumeResult {
    /// Successful debit leaving `credits` on the balance.
    #[must_use]
    pub fn consumed(credits: i64) -> Self {
        Self {
            success: true,
            message: "Credits consumed successfully".to_string(),
            credits: Some(credits),
        }
    }

    /// Failed debit for a request that never reached the ledger, such as a
    /// malformed body.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            credits: None,
        }
    }
}

impl From<&LedgerError> for ConsumeResult {
    fn from(err: &LedgerError) -> Self {
        let (message, credits) = match err {
            LedgerError::Unauthenticated => ("Not authenticated".to_string(), None),
            LedgerError::NotFound => ("User not found".to_string(), None),
            LedgerError::InsufficientBalance { balance } => {
                ("Insufficient credits".to_string(), Some(*balance))
            }
            LedgerError::InvalidAmount(amount) => {
                (format!("Amount must be a positive integer, got {amount}"), None)
            }
            // Storage detail stays in the server log.
            LedgerError::Storage(_) => ("Failed to consume credits".to_string(), None),
        };
        Self {
            success: false,
            message,
            credits,
        }
    }
}

impl From<std::result::Result<i64, LedgerError>> for ConsumeResult {
    fn from(result: std::result::Result<i64, LedgerError>) -> Self {
        match result {
            Ok(credits) => Self::consumed(credits),
            Err(err) => Self::from(&err),
        }
    }
}
