//! Common test utilities for tally-service integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use axum_test::{TestRequest, TestServer};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};

use tally_core::{User, UserId};
use tally_service::auth::JwtClaims;
use tally_service::crypto::hmac_sha256_hex;
use tally_service::{create_router, AppState, BalanceNotifier, ServiceConfig};
use tally_store::{MemoryStore, Store};

pub const JWT_SECRET: &str = "test-jwt-secret";
pub const ADMIN_KEY: &str = "test-admin-key";
pub const WEBHOOK_SECRET: &str = "whsec_test";

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Direct handle on the backing store for setup and assertions.
    pub store: Arc<MemoryStore>,
    /// The notifier the service publishes through.
    pub notifier: BalanceNotifier,
    /// A test user for authenticated requests.
    pub test_user_id: UserId,
}

impl TestHarness {
    /// Create a new test harness with an empty in-memory store.
    pub fn new() -> Self {
        Self::with_config(Self::config())
    }

    /// Create a harness that verifies webhook signatures.
    pub fn with_webhook_secret() -> Self {
        Self::with_config(ServiceConfig {
            stripe_webhook_secret: Some(WEBHOOK_SECRET.into()),
            ..Self::config()
        })
    }

    pub fn with_config(config: ServiceConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let notifier = BalanceNotifier::default();

        let state = AppState::with_notifier(store.clone(), config, notifier.clone());
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            store,
            notifier,
            test_user_id: UserId::new(42).unwrap(),
        }
    }

    /// Baseline configuration used by every harness.
    pub fn config() -> ServiceConfig {
        ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            auth_jwt_secret: Some(JWT_SECRET.into()),
            admin_api_key: Some(ADMIN_KEY.into()),
            ..ServiceConfig::default()
        }
    }

    /// Insert a user with `credits` directly into the store.
    pub async fn seed_user(&self, user_id: UserId, credits: i64) {
        assert!(self
            .store
            .create_user(&User::new(user_id, credits))
            .await
            .unwrap());
    }

    /// Authorization header for the test user.
    pub fn user_auth_header(&self) -> (HeaderName, HeaderValue) {
        auth_header_for(self.test_user_id)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Mint a valid token for `user_id`.
pub fn token_for(user_id: UserId) -> String {
    token_with_secret(&user_id.to_string(), JWT_SECRET)
}

/// Mint a token for an arbitrary subject and secret.
pub fn token_with_secret(subject: &str, secret: &str) -> String {
    let now = Utc::now().timestamp();
    let claims = JwtClaims {
        sub: subject.to_string(),
        exp: now + 3600,
        iat: Some(now),
        iss: None,
        aud: None,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

pub fn auth_header_for(user_id: UserId) -> (HeaderName, HeaderValue) {
    bearer(&token_for(user_id))
}

pub fn bearer(token: &str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("authorization"),
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
    )
}

pub fn admin_header(key: &str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-admin-key"),
        HeaderValue::from_str(key).unwrap(),
    )
}

/// `stripe-signature` header for `body`, signed now.
pub fn stripe_signature(body: &str, secret: &str) -> (HeaderName, HeaderValue) {
    stripe_signature_at(body, secret, Utc::now().timestamp())
}

pub fn stripe_signature_at(body: &str, secret: &str, t: i64) -> (HeaderName, HeaderValue) {
    let sig = hmac_sha256_hex(secret, &format!("{t}.{body}")).unwrap();
    (
        HeaderName::from_static("stripe-signature"),
        HeaderValue::from_str(&format!("t={t},v1={sig}")).unwrap(),
    )
}

/// Attach a `(name, value)` header pair.
pub trait RequestExt {
    fn with_header(self, header: (HeaderName, HeaderValue)) -> Self;
}

impl RequestExt for TestRequest {
    fn with_header(self, (name, value): (HeaderName, HeaderValue)) -> Self {
        self.add_header(name, value)
    }
}
