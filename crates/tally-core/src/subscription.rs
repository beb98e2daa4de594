//! Subscription read model.
//!
//! Rows are written only from billing-provider events. Readers get a
//! `SubscriptionView`, which adds the derived `is_paid` and `is_canceled`
//! flags evaluated at a given instant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// A user's subscription as last reported by the billing provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Owning user. One subscription per user at most.
    pub user_id: UserId,

    /// Provider status.
    pub status: SubscriptionStatus,

    /// End of the current billing period.
    pub current_period_end: DateTime<Utc>,

    /// Provider subscription id.
    pub stripe_subscription_id: String,

    /// Provider price id, if the event carried one.
    pub stripe_price_id: Option<String>,

    /// Creation time of the provider event that produced this row.
    pub last_event_at: DateTime<Utc>,

    /// When the row was last written.
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Whether an event created at `event_at` may overwrite this row.
    ///
    /// Equal timestamps are accepted so a redelivered event is idempotent.
    #[must_use]
    pub fn accepts_event_at(&self, event_at: DateTime<Utc>) -> bool {
        event_at >= self.last_event_at
    }
}

/// Status of a subscription, mirroring the billing provider's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Paid and in good standing.
    Active,

    /// Canceled by the user or the provider.
    Canceled,

    /// Latest invoice failed; provider is retrying.
    PastDue,

    /// Initial payment not completed.
    Incomplete,

    /// Initial payment never completed and the subscription lapsed.
    IncompleteExpired,

    /// In a free trial.
    Trialing,

    /// Retries exhausted without payment.
    Unpaid,

    /// Paused by the provider.
    Paused,

    /// A status this build does not know about.
    #[serde(other)]
    Unknown,
}

impl SubscriptionStatus {
    /// Stable string form, used as the database column value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Canceled => "canceled",
            Self::PastDue => "past_due",
            Self::Incomplete => "incomplete",
            Self::IncompleteExpired => "incomplete_expired",
            Self::Trialing => "trialing",
            Self::Unpaid => "unpaid",
            Self::Paused => "paused",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a provider or column value. Unrecognized values map to `Unknown`.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "active" => Self::Active,
            "canceled" | "cancelled" => Self::Canceled,
            "past_due" => Self::PastDue,
            "incomplete" => Self::Incomplete,
            "incomplete_expired" => Self::IncompleteExpired,
            "trialing" => Self::Trialing,
            "unpaid" => Self::Unpaid,
            "paused" => Self::Paused,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A subscription plus its derived flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionView {
    /// The stored subscription fields.
    #[serde(flatten)]
    pub subscription: Subscription,

    /// `status == active` and the period has not ended.
    pub is_paid: bool,

    /// `status == canceled`.
    pub is_canceled: bool,
}

impl SubscriptionView {
    /// Derive the view as of `now`.
    #[must_use]
    pub fn at(subscription: Subscription, now: DateTime<Utc>) -> Self {
        let is_paid = subscription.status == SubscriptionStatus::Active
            && subscription.current_period_end > now;
        let is_canceled = subscription.status == SubscriptionStatus::Canceled;
        Self {
            subscription,
            is_paid,
            is_canceled,
        }
    }
}
