//! Core types for the tally credit ledger.
//!
//! This crate provides the foundational types shared by the store, the service
//! and the client SDK:
//!
//! - **Identifiers**: `UserId`, `TransactionId`
//! - **Users**: `User` and its non-negative credit balance
//! - **Subscriptions**: `Subscription`, `SubscriptionStatus`, `SubscriptionView`
//! - **Ledger**: `CreditTransaction`, `TransactionType`
//! - **Outcomes**: `LedgerError`, `ConsumeResult`
//!
//! # Credits
//!
//! A credit is an indivisible integer unit. Balances are stored as `i64` and
//! never go below zero.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod credits;
pub mod error;
pub mod ids;
pub mod outcome;
pub mod subscription;
pub mod user;

pub use credits::{CreditTransaction, TransactionType};
pub use error::{LedgerError, Result};
pub use ids::{IdError, TransactionId, UserId};
pub use outcome::ConsumeResult;
pub use subscription::{Subscription, SubscriptionStatus, SubscriptionView};
pub use user::User;
