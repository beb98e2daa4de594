//! Request and response types.

use serde::{Deserialize, Serialize};

pub use tally_core::{ConsumeResult, SubscriptionStatus, SubscriptionView};

/// Consume request body.
#[derive(Debug, Clone, Serialize)]
pub struct ConsumeRequest {
    /// Credits to debit.
    pub amount: i64,
}

/// Balance response.
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceResponse {
    /// Current credit balance.
    pub credits: i64,
}

/// Subscription response.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionResponse {
    /// The user's subscription, if any.
    pub subscription: Option<SubscriptionView>,
}

/// API error response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    /// Error details.
    pub error: ApiErrorBody,
}

/// API error body.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    /// Error code.
    pub code: String,
    /// Error message.
    pub message: String,
    /// Additional details.
    pub details: Option<serde_json::Value>,
}
