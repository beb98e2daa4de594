//! Cryptographic utilities for webhook verification.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Why a webhook signature was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    /// The header had no `t=` element, or it was not a unix timestamp.
    #[error("missing or malformed timestamp")]
    MissingTimestamp,

    /// The header had no `v1=` element.
    #[error("no v1 signature present")]
    MissingSignature,

    /// The timestamp is outside the tolerance window.
    #[error("timestamp outside tolerance: {age}s")]
    Expired {
        /// Seconds between the signed timestamp and now.
        age: i64,
    },

    /// No `v1` signature matched.
    #[error("signature mismatch")]
    Mismatch,
}

/// Compute HMAC-SHA256 and return the hex-encoded result.
///
/// Returns `None` only if the HMAC implementation rejects the key, which
/// HMAC-SHA256 never does (RFC 2104 accepts keys of any size).
#[must_use]
pub fn hmac_sha256_hex(secret: &str, message: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(message.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time string comparison.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

/// Verify a Stripe-style `t=<unix>,v1=<hex>[,v1=<hex>...]` signature header.
///
/// The signed message is `"{t}.{payload}"`. Any matching `v1` entry accepts
/// the payload, provided `t` is within `tolerance_seconds` of `now` (unix
/// seconds) in either direction.
pub fn verify_stripe_signature(
    payload: &str,
    header: &str,
    secret: &str,
    tolerance_seconds: i64,
    now: i64,
) -> Result<(), SignatureError> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        let mut kv = part.trim().splitn(2, '=');
        match (kv.next(), kv.next()) {
            (Some("t"), Some(ts)) => timestamp = Some(ts),
            (Some("v1"), Some(sig)) => signatures.push(sig),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MissingTimestamp)?;
    let signed_at: i64 = timestamp
        .parse()
        .map_err(|_| SignatureError::MissingTimestamp)?;

    if signatures.is_empty() {
        return Err(SignatureError::MissingSignature);
    }

    let age = now.saturating_sub(signed_at);
    if age.abs() > tolerance_seconds {
        return Err(SignatureError::Expired { age });
    }

    let expected = hmac_sha256_hex(secret, &format!("{timestamp}.{payload}"))
        .ok_or(SignatureError::Mismatch)?;

    if signatures.iter().any(|sig| constant_time_eq(&expected, sig)) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}
