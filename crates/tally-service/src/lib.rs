//! Tally HTTP API service.
//!
//! This crate hosts the two components callers interact with:
//!
//! - [`LedgerGuard`]: authenticated, atomic, sufficiency-checked credit debits
//! - [`SubscriptionMirror`]: read model of billing-provider subscriptions
//!
//! plus the axum API around them, webhook ingest feeding the mirror, and the
//! [`BalanceNotifier`] that announces balance changes to cache owners.
//!
//! # Authentication
//!
//! 1. **HS256 JWT bearer tokens** - for end users; `sub` is the user id
//! 2. **Admin API key** - for operator top-ups

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod notify;
pub mod routes;
pub mod state;
pub mod subscriptions;

pub use config::{ServiceConfig, StorageBackend};
pub use error::ApiError;
pub use ledger::LedgerGuard;
pub use notify::{BalanceChanged, BalanceNotifier};
pub use routes::create_router;
pub use state::AppState;
pub use subscriptions::SubscriptionMirror;
