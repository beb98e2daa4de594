//! API handlers.

pub mod credits;
pub mod health;
pub mod subscription;
pub mod users;
pub mod webhooks;
