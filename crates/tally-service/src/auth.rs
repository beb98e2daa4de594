//! Authentication extractors.
//!
//! - `AuthUser` - end-user authentication via HS256 JWT
//! - `AdminAuth` - operator authentication via the `X-Admin-Key` header
//!
//! Handlers that must answer unauthenticated callers in their own format
//! (the consume endpoint) extract `Option<AuthUser>` instead; axum turns a
//! rejected token into `None`.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use tally_core::UserId;

use crate::crypto::constant_time_eq;
use crate::error::ApiError;
use crate::state::AppState;

/// An authenticated user extracted from a bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The user ID.
    pub user_id: UserId,
}

/// JWT claims accepted by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject: the decimal user id.
    pub sub: String,
    /// Expiration time (unix seconds).
    pub exp: i64,
    /// Issued at (unix seconds).
    #[serde(default)]
    pub iat: Option<i64>,
    /// Issuer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Audience.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized)?;

        let claims = validate_jwt(token, state)?;

        let user_id = claims.sub.parse::<UserId>().map_err(|e| {
            tracing::debug!(error = %e, "JWT subject is not a user id");
            ApiError::Unauthorized
        })?;

        Ok(AuthUser { user_id })
    }
}

/// Validate an HS256 token against the configured secret, issuer and audience.
fn validate_jwt(token: &str, state: &AppState) -> Result<JwtClaims, ApiError> {
    let Some(secret) = state.config.auth_jwt_secret.as_deref() else {
        tracing::warn!("AUTH_JWT_SECRET not configured - rejecting bearer token");
        return Err(ApiError::Unauthorized);
    };

    let mut validation = Validation::new(Algorithm::HS256);
    match &state.config.auth_audience {
        Some(audience) => validation.set_audience(&[audience]),
        None => validation.validate_aud = false,
    }
    if let Some(issuer) = &state.config.auth_issuer {
        validation.set_issuer(&[issuer]);
    }

    decode::<JwtClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!(error = %e, "JWT validation failed");
            ApiError::Unauthorized
        })
}

/// Admin authentication via API key.
///
/// Requires the `X-Admin-Key` header to match the configured admin key.
#[derive(Debug, Clone)]
pub struct AdminAuth {
    /// Admin identifier (for audit logging).
    pub admin_id: String,
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let admin_key = parts
            .headers
            .get("x-admin-key")
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let expected_key = state
            .config
            .admin_api_key
            .as_ref()
            .ok_or(ApiError::Unauthorized)?;

        if !constant_time_eq(admin_key, expected_key) {
            return Err(ApiError::Unauthorized);
        }

        let admin_id = parts
            .headers
            .get("x-admin-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("admin")
            .to_string();

        tracing::info!(admin_id = %admin_id, "Admin authenticated");

        Ok(AdminAuth { admin_id })
    }
}
