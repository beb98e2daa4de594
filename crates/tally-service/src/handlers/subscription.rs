//! Subscription status handler.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use tally_core::SubscriptionView;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Subscription response.
#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    /// The caller's subscription, or `null` if they never subscribed.
    pub subscription: Option<SubscriptionView>,
}

/// Get the caller's mirrored subscription.
pub async fn get_subscription(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    let subscription = state.mirror.get_subscription(auth.user_id).await?;
    Ok(Json(SubscriptionResponse { subscription }))
}
