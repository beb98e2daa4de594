//! Identifier types for tally.
//!
//! User ids are positive integers assigned by the relational user table.
//! Transaction ids are ULIDs so ledger rows sort chronologically by key.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, OnceLock};
use ulid::{Generator, Ulid};

/// A user identifier.
///
/// The value is always strictly positive. It arrives either from the `sub`
/// claim of a verified token or from a billing provider's metadata.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct UserId(i64);

impl UserId {
    /// Create a user id, rejecting zero and negative values.
    ///
    /// # Errors
    ///
    /// Returns `IdError::NotPositive` if `value <= 0`.
    pub const fn new(value: i64) -> Result<Self, IdError> {
        if value > 0 {
            Ok(Self(value))
        } else {
            Err(IdError::NotPositive)
        }
    }

    /// Return the raw integer value.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }

    /// Big-endian bytes of the id, so byte order matches numeric order.
    #[must_use]
    pub const fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    /// Rebuild an id from big-endian bytes.
    ///
    /// # Errors
    ///
    /// Returns `IdError::NotPositive` if the decoded value is not positive.
    pub const fn from_be_bytes(bytes: [u8; 8]) -> Result<Self, IdError> {
        Self::new(i64::from_be_bytes(bytes))
    }
}

impl FromStr for UserId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().parse::<i64>().map_err(|_| IdError::InvalidInteger)?;
        Self::new(value)
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for UserId {
    type Error = IdError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for i64 {
    fn from(id: UserId) -> Self {
        id.0
    }
}

/// A transaction identifier using ULID for time-ordering.
///
/// Transaction IDs are time-ordered to allow efficient range queries
/// and natural chronological sorting.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TransactionId(Ulid);

impl TransactionId {
    /// Generate a new `TransactionId` with the current timestamp.
    ///
    /// Ids generated by one process are strictly increasing, even within
    /// the same millisecond.
    #[must_use]
    pub fn generate() -> Self {
        static GENERATOR: OnceLock<Mutex<Generator>> = OnceLock::new();

        let generator = GENERATOR.get_or_init(|| Mutex::new(Generator::new()));
        let next = generator
            .lock()
            .ok()
            .and_then(|mut g| g.generate().ok())
            .unwrap_or_else(Ulid::new);
        Self(next)
    }

    /// Return the bytes of the ULID (16 bytes).
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 16] {
        self.0.to_bytes()
    }

    /// Create a `TransactionId` from bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Ulid::from_bytes(bytes))
    }
}

impl FromStr for TransactionId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ulid = Ulid::from_string(s).map_err(|_| IdError::InvalidUlid)?;
        Ok(Self(ulid))
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionId({})", self.0)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for TransactionId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TransactionId> for String {
    fn from(id: TransactionId) -> Self {
        id.0.to_string()
    }
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input is not a decimal integer.
    #[error("invalid integer id")]
    InvalidInteger,

    /// The integer id is zero or negative.
    #[error("id must be positive")]
    NotPositive,

    /// The input is not a valid ULID.
    #[error("invalid ULID format")]
    InvalidUlid,
}
