//! User records and their credit balance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// A user as seen by the ledger.
///
/// Identity and profile live with the authentication provider; the ledger
/// only owns the credit balance and the billing-provider link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// The user ID.
    pub id: UserId,

    /// Contact email, if known.
    pub email: Option<String>,

    /// Current credit balance. Never negative.
    pub credits: i64,

    /// Billing-provider customer id, used to resolve webhook events.
    pub stripe_customer_id: Option<String>,

    /// When the record was created.
    pub created_at: DateTime<Utc>,

    /// When the record was last updated.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a user with the given starting balance.
    ///
    /// Negative starting balances are clamped to zero.
    #[must_use]
    pub fn new(id: UserId, credits: i64) -> Self {
        let now = Utc::now();
        Self {
            id,
            email: None,
            credits: credits.max(0),
            stripe_customer_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the contact email.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Link a billing-provider customer id.
    #[must_use]
    pub fn with_stripe_customer(mut self, customer_id: impl Into<String>) -> Self {
        self.stripe_customer_id = Some(customer_id.into());
        self
    }

    /// Check whether the balance covers `amount`.
    #[must_use]
    pub fn has_sufficient_credits(&self, amount: i64) -> bool {
        self.credits >= amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_id() -> UserId {
        UserId::new(1).unwrap()
    }

    #[test]
    fn new_user_clamps_negative_balance() {
        let user = User::new(user_id(), -5);
        assert_eq!(user.credits, 0);
        assert!(user.email.is_none());
    }

    #[test]
    fn sufficient_credits_boundary() {
        let user = User::new(user_id(), 10);
        assert!(user.has_sufficient_credits(9));
        assert!(user.has_sufficient_credits(10));
        assert!(!user.has_sufficient_credits(11));
    }
}
