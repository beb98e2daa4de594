//! Tally Client SDK.
//!
//! Used by the dashboard to debit credits and read balance and subscription
//! state on behalf of a signed-in user.
//!
//! # Example
//!
//! ```no_run
//! use tally_client::TallyClient;
//!
//! # async fn example() -> Result<(), tally_client::ClientError> {
//! let client = TallyClient::new("http://tally.internal:8080")?;
//!
//! let result = client.consume("user-jwt", 10).await?;
//! if result.success {
//!     println!("{} credits left", result.credits.unwrap_or_default());
//! } else {
//!     println!("{}", result.message);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod error;
mod types;

pub use client::{ClientOptions, TallyClient};
pub use error::ClientError;
pub use types::*;
