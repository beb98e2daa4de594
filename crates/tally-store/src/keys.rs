//! Key encoding for `RocksDB` column families.

use tally_core::{TransactionId, UserId};

use crate::error::{Result, StoreError};

/// Length of an encoded user key.
pub const USER_KEY_LEN: usize = 8;

/// Create a user key from a user ID.
#[must_use]
pub fn user_key(user_id: UserId) -> Vec<u8> {
    user_id.to_be_bytes().to_vec()
}

/// Decode a user key written by [`user_key`].
///
/// # Errors
///
/// Returns `StoreError::Serialization` if the bytes are not a valid user id.
pub fn decode_user_key(key: &[u8]) -> Result<UserId> {
    let bytes: [u8; USER_KEY_LEN] = key
        .try_into()
        .map_err(|_| StoreError::Serialization(format!("user key has {} bytes", key.len())))?;
    UserId::from_be_bytes(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Create a transaction key from a transaction ID.
#[must_use]
pub fn transaction_key(transaction_id: &TransactionId) -> Vec<u8> {
    transaction_id.to_bytes().to_vec()
}

/// Create a user-transaction index key.
///
/// Format: `user_id (8 bytes) || transaction_id (16 bytes)`
///
/// Since ULIDs are time-ordered, transactions for a user sort by time.
#[must_use]
pub fn user_transaction_key(user_id: UserId, transaction_id: &TransactionId) -> Vec<u8> {
    let mut key = Vec::with_capacity(USER_KEY_LEN + 16);
    key.extend_from_slice(&user_id.to_be_bytes());
    key.extend_from_slice(&transaction_id.to_bytes());
    key
}

/// Extract the transaction ID from a user-transaction index key.
///
/// # Errors
///
/// Returns `StoreError::Serialization` if the key is not 24 bytes long.
pub fn transaction_id_from_user_key(key: &[u8]) -> Result<TransactionId> {
    let bytes: [u8; 16] = key
        .get(USER_KEY_LEN..)
        .and_then(|rest| rest.try_into().ok())
        .ok_or_else(|| StoreError::Serialization("malformed transaction index key".into()))?;
    Ok(TransactionId::from_bytes(bytes))
}

/// Create a customer index key.
#[must_use]
pub fn customer_key(customer_id: &str) -> Vec<u8> {
    customer_id.as_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_transaction_key_layout() {
        let user_id = UserId::new(77).unwrap();
        let tx_id = TransactionId::generate();
        let key = user_transaction_key(user_id, &tx_id);

        assert_eq!(key.len(), 24);
        assert_eq!(&key[..8], &user_id.to_be_bytes());
        assert_eq!(transaction_id_from_user_key(&key).unwrap(), tx_id);
    }

    #[test]
    fn short_index_key_is_rejected() {
        assert!(transaction_id_from_user_key(&[0u8; 10]).is_err());
        assert!(decode_user_key(&[1, 2, 3]).is_err());
    }
}
