//! User registration handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use tally_core::User;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// User response.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    /// User ID.
    pub user_id: i64,
    /// Email, if known.
    pub email: Option<String>,
    /// Current credit balance.
    pub credits: i64,
    /// Linked Stripe customer, if any.
    pub stripe_customer_id: Option<String>,
    /// Created timestamp.
    pub created_at: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id.get(),
            email: user.email.clone(),
            credits: user.credits,
            stripe_customer_id: user.stripe_customer_id.clone(),
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// Register request.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    /// Optional email.
    pub email: Option<String>,
    /// Stripe customer created by the checkout flow, if any.
    pub stripe_customer_id: Option<String>,
}

/// Register the caller's user record.
///
/// New users start with the configured signup grant. The user row and the
/// grant ledger row are written together.
pub async fn register(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let mut user = User::new(auth.user_id, 0);
    if let Some(email) = body.email {
        user = user.with_email(email);
    }
    if let Some(customer_id) = body.stripe_customer_id {
        user = user.with_stripe_customer(customer_id);
    }

    let user = state
        .store
        .create_user_with_grant(&user, state.config.signup_credits.max(0), "Signup credits")
        .await?
        .ok_or_else(|| ApiError::Conflict("User already exists".into()))?;

    tracing::info!(user_id = %auth.user_id, credits = user.credits, "User registered");

    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}

/// Get the caller's user record.
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state
        .store
        .get_user(auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    Ok(Json(UserResponse::from(&user)))
}
