//! Router configuration.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{credits, health, subscription, users, webhooks};
use crate::state::AppState;

/// Maximum concurrent requests for API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Users (JWT auth)
/// - `POST /v1/users/me` - Register the caller
/// - `GET /v1/users/me` - Get the caller's record
///
/// ## Credits
/// - `GET /v1/credits/balance` - Current balance (JWT)
/// - `POST /v1/credits/consume` - Debit credits (JWT, uniform result body)
/// - `GET /v1/credits/transactions` - Ledger history (JWT)
/// - `POST /v1/credits/add` - Top up a user (admin key)
///
/// ## Subscription (JWT auth)
/// - `GET /v1/subscription` - Mirrored subscription with derived flags
///
/// ## Webhooks (signature verification)
/// - `POST /webhooks/stripe` - Subscription lifecycle events
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.cors_origins);
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let state = Arc::new(state);

    let api_routes = Router::new()
        .route("/users/me", post(users::register).get(users::get_me))
        .route("/credits/balance", get(credits::get_balance))
        .route("/credits/consume", post(credits::consume))
        .route("/credits/transactions", get(credits::list_transactions))
        .route("/credits/add", post(credits::admin_add_credits))
        .route("/subscription", get(subscription::get_subscription))
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        .route("/health", get(health::health))
        .nest("/v1", api_routes)
        // Webhooks are not rate limited; delivery is paced by the provider.
        .route("/webhooks/stripe", post(webhooks::stripe_webhook))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(request_timeout_seconds)))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
