//! Credit ledger rows.
//!
//! Every balance change writes one `CreditTransaction` in the same atomic
//! storage step as the balance update itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{TransactionId, UserId};

/// A credit transaction representing a balance change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditTransaction {
    /// Unique transaction ID (ULID for time-ordering).
    pub id: TransactionId,

    /// The user whose balance was affected.
    pub user_id: UserId,

    /// Signed amount. Positive = credit, negative = debit.
    pub amount: i64,

    /// Type of transaction.
    pub transaction_type: TransactionType,

    /// Balance after this transaction.
    pub balance_after: i64,

    /// Human-readable description.
    pub description: String,

    /// When the transaction was created.
    pub created_at: DateTime<Utc>,
}

impl CreditTransaction {
    /// Create a debit row. The stored amount is always negative.
    #[must_use]
    pub fn debit(user_id: UserId, amount: i64, balance_after: i64, description: String) -> Self {
        Self::new(
            user_id,
            -amount.abs(),
            TransactionType::Debit,
            balance_after,
            description,
        )
    }

    /// Create a credit row of the given kind.
    #[must_use]
    pub fn credit(
        user_id: UserId,
        amount: i64,
        transaction_type: TransactionType,
        balance_after: i64,
        description: String,
    ) -> Self {
        Self::new(
            user_id,
            amount.abs(),
            transaction_type,
            balance_after,
            description,
        )
    }

    fn new(
        user_id: UserId,
        amount: i64,
        transaction_type: TransactionType,
        balance_after: i64,
        description: String,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            user_id,
            amount,
            transaction_type,
            balance_after,
            description,
            created_at: Utc::now(),
        }
    }
}

/// Kind of balance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Credits consumed by a user action.
    Debit,

    /// Credits bought by the user.
    TopUp,

    /// Credits granted by an operator (promo, support).
    Grant,
}

impl TransactionType {
    /// Stable string form, used as the database column value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debit => "debit",
            Self::TopUp => "top_up",
            Self::Grant => "grant",
        }
    }

    /// Parse the database column value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "debit" => Some(Self::Debit),
            "top_up" => Some(Self::TopUp),
            "grant" => Some(Self::Grant),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debit_amount_is_negative() {
        let user_id = UserId::new(3).unwrap();
        let tx = CreditTransaction::debit(user_id, 25, 75, "export".into());
        assert_eq!(tx.amount, -25);
        assert_eq!(tx.balance_after, 75);
        assert_eq!(tx.transaction_type, TransactionType::Debit);
    }

    #[test]
    fn credit_amount_is_positive() {
        let user_id = UserId::new(3).unwrap();
        let tx = CreditTransaction::credit(user_id, -40, TransactionType::Grant, 40, "promo".into());
        assert_eq!(tx.amount, 40);
    }

    #[test]
    fn transaction_type_column_values() {
        for kind in [
            TransactionType::Debit,
            TransactionType::TopUp,
            TransactionType::Grant,
        ] {
            assert_eq!(TransactionType::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(TransactionType::parse("refund"), None);
    }
}
