//! Liveness and storage readiness.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use tally_core::UserId;

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when storage does not answer.
    pub status: &'static str,
    /// Service version.
    pub version: &'static str,
    /// Configured storage backend.
    pub storage: &'static str,
    /// Whether a storage read succeeded.
    pub storage_ok: bool,
}

/// Report liveness plus a single storage read.
///
/// Answers 503 while the backend is unreachable so load balancers stop
/// routing debits to this instance.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let storage_ok = match UserId::new(1) {
        Ok(id) => match state.store.get_user(id).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Storage health check failed");
                false
            }
        },
        Err(_) => false,
    };

    let (status, code) = if storage_ok {
        ("ok", StatusCode::OK)
    } else {
        ("degraded", StatusCode::SERVICE_UNAVAILABLE)
    };

    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            storage: state.config.storage_backend.as_str(),
            storage_ok,
        }),
    )
}
