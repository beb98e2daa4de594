//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use tally_core::LedgerError;
use tally_store::StoreError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Conflict - resource already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Insufficient credits.
    #[error("insufficient credits: balance={balance}")]
    InsufficientCredits {
        /// Current balance.
        balance: i64,
    },

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                self.to_string(),
                None,
            ),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone(), None),
            Self::InsufficientCredits { balance } => (
                StatusCode::PAYMENT_REQUIRED,
                "insufficient_credits",
                self.to_string(),
                Some(serde_json::json!({ "balance": balance })),
            ),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound("user not found".into()),
            StoreError::InsufficientCredits { balance, .. } => Self::InsufficientCredits { balance },
            StoreError::BalanceOverflow => Self::BadRequest("balance overflow".into()),
            StoreError::Database(msg) | StoreError::Serialization(msg) => Self::Internal(msg),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Unauthenticated => Self::Unauthorized,
            LedgerError::NotFound => Self::NotFound("user not found".into()),
            LedgerError::InsufficientBalance { balance } => Self::InsufficientCredits { balance },
            LedgerError::InvalidAmount(amount) => {
                Self::BadRequest(format!("amount must be positive, got {amount}"))
            }
            LedgerError::Storage(msg) => Self::Internal(msg),
        }
    }
}

/// HTTP status for a ledger outcome on the consume endpoint.
#[must_use]
pub fn ledger_status(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::Unauthenticated => StatusCode::UNAUTHORIZED,
        LedgerError::NotFound => StatusCode::NOT_FOUND,
        LedgerError::InsufficientBalance { .. } => StatusCode::PAYMENT_REQUIRED,
        LedgerError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
        LedgerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_errors_map_to_statuses() {
        assert_eq!(ledger_status(&LedgerError::Unauthenticated), StatusCode::UNAUTHORIZED);
        assert_eq!(ledger_status(&LedgerError::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            ledger_status(&LedgerError::InsufficientBalance { balance: 1 }),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(ledger_status(&LedgerError::InvalidAmount(0)), StatusCode::BAD_REQUEST);
        assert_eq!(
            ledger_status(&LedgerError::Storage("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_errors_hide_detail() {
        let response = ApiError::from(StoreError::Database("connection reset".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn balance_overflow_is_bad_request() {
        let response = ApiError::from(StoreError::BalanceOverflow).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
