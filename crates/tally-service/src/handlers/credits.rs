//! Credit balance, consumption and transaction handlers.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use tally_core::{ConsumeResult, CreditTransaction, LedgerError, TransactionType, UserId};

use crate::auth::{AdminAuth, AuthUser};
use crate::error::{ledger_status, ApiError};
use crate::state::AppState;

/// Balance response.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    /// Current credit balance.
    pub credits: i64,
}

/// Get current credit balance.
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<BalanceResponse>, ApiError> {
    let credits = state.ledger.balance(Some(auth.user_id)).await?;
    Ok(Json(BalanceResponse { credits }))
}

/// Consume request.
#[derive(Debug, Deserialize)]
pub struct ConsumeRequest {
    /// Credits to debit.
    pub amount: i64,
}

/// Debit credits from the caller's balance.
///
/// Always answers with the uniform `{success, message, credits}` body, even
/// when the caller is not authenticated or the body does not parse.
/// Authentication is checked before the body.
pub async fn consume(
    State(state): State<Arc<AppState>>,
    auth: Option<AuthUser>,
    body: Result<Json<ConsumeRequest>, JsonRejection>,
) -> (StatusCode, Json<ConsumeResult>) {
    let Some(auth) = auth else {
        let err = LedgerError::Unauthenticated;
        return (ledger_status(&err), Json(ConsumeResult::from(&err)));
    };

    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            let detail = rejection.body_text();
            tracing::debug!(user_id = %auth.user_id, error = %detail, "Malformed consume request");
            return (
                StatusCode::BAD_REQUEST,
                Json(ConsumeResult::rejected(format!("Invalid request body: {detail}"))),
            );
        }
    };

    match state.ledger.consume(Some(auth.user_id), body.amount).await {
        Ok(credits) => (StatusCode::OK, Json(ConsumeResult::consumed(credits))),
        Err(e) => (ledger_status(&e), Json(ConsumeResult::from(&e))),
    }
}

/// Transaction list query parameters.
#[derive(Debug, Deserialize)]
pub struct ListTransactionsQuery {
    /// Maximum number of transactions to return (default: 50).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

/// Transaction response.
#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    /// Transaction ID.
    pub id: String,
    /// Amount (positive = credit, negative = debit).
    pub amount: i64,
    /// Transaction type.
    pub transaction_type: String,
    /// Balance after this transaction.
    pub balance_after: i64,
    /// Description.
    pub description: String,
    /// Timestamp.
    pub created_at: String,
}

impl From<&CreditTransaction> for TransactionResponse {
    fn from(tx: &CreditTransaction) -> Self {
        Self {
            id: tx.id.to_string(),
            amount: tx.amount,
            transaction_type: tx.transaction_type.as_str().to_string(),
            balance_after: tx.balance_after,
            description: tx.description.clone(),
            created_at: tx.created_at.to_rfc3339(),
        }
    }
}

/// List transactions response.
#[derive(Debug, Serialize)]
pub struct ListTransactionsResponse {
    /// Transactions (newest first).
    pub transactions: Vec<TransactionResponse>,
    /// Whether there are more transactions.
    pub has_more: bool,
}

/// List transaction history.
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<ListTransactionsResponse>, ApiError> {
    state
        .store
        .get_user(auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    // Fetch one more than requested to determine has_more
    let limit = query.limit.min(100);
    let transactions = state
        .store
        .list_transactions_by_user(auth.user_id, limit + 1, query.offset)
        .await?;

    let has_more = transactions.len() > limit;
    let transactions: Vec<_> = transactions
        .iter()
        .take(limit)
        .map(TransactionResponse::from)
        .collect();

    Ok(Json(ListTransactionsResponse {
        transactions,
        has_more,
    }))
}

/// Admin add credits request.
#[derive(Debug, Deserialize)]
pub struct AdminAddCreditsRequest {
    /// User to credit.
    pub user_id: i64,
    /// Credits to add.
    pub amount: i64,
    /// Reason recorded on the ledger row.
    pub reason: String,
}

/// Admin add credits response.
#[derive(Debug, Serialize)]
pub struct AdminAddCreditsResponse {
    /// Ledger row ID.
    pub transaction_id: String,
    /// User credited.
    pub user_id: i64,
    /// Balance after the top-up.
    pub credits: i64,
}

/// Top up a user's balance (admin only).
pub async fn admin_add_credits(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Json(body): Json<AdminAddCreditsRequest>,
) -> Result<Json<AdminAddCreditsResponse>, ApiError> {
    if body.amount <= 0 {
        return Err(ApiError::BadRequest("Amount must be positive".into()));
    }
    if body.reason.trim().is_empty() {
        return Err(ApiError::BadRequest("Reason is required".into()));
    }

    let user_id = UserId::new(body.user_id).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let tx = state
        .store
        .add_credits(user_id, body.amount, TransactionType::TopUp, &body.reason)
        .await?;

    tracing::info!(
        admin_id = %admin.admin_id,
        user_id = %user_id,
        amount = body.amount,
        reason = %body.reason,
        balance = tx.balance_after,
        "Admin added credits"
    );

    state.notifier.publish(user_id, tx.balance_after);

    Ok(Json(AdminAddCreditsResponse {
        transaction_id: tx.id.to_string(),
        user_id: user_id.get(),
        credits: tx.balance_after,
    }))
}
