//! Signature and replay validation for webhook deliveries.
//!
//! Linear signs each delivery with HMAC-SHA256 over the raw request body,
//! sending the hex digest in the `Linear-Signature` header, and embeds a
//! millisecond timestamp in the payload for replay protection.
//!
//! # Ordering
//!
//! [`verify_signature`] operates on the raw, unparsed body and must run
//! before the body is interpreted as JSON. [`check_timestamp`] needs the
//! decoded `webhookTimestamp` field and runs after decode.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Default replay window: deliveries older (or newer) than this are rejected.
pub const DEFAULT_MAX_TIMESTAMP_AGE_SECONDS: u64 = 60;

// ============================================================================
// Error Types
// ============================================================================

/// Authentication failures for a webhook delivery
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The provided signature does not match the HMAC-SHA256 digest of the
    /// raw body, or is not valid hex.
    ///
    /// Maps to: `401 Unauthorized`
    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// A secret is configured but the delivery carried no signature header.
    ///
    /// Maps to: `401 Unauthorized`
    #[error("Missing Linear-Signature header")]
    MissingSignatureHeader,

    /// The payload carried no `webhookTimestamp` field.
    ///
    /// Maps to: `400 Bad Request`
    #[error("Missing webhookTimestamp in payload")]
    MissingTimestamp,

    /// The delivery is outside the replay window.
    ///
    /// Maps to: `400 Bad Request`
    #[error("Webhook timestamp too old: {age_seconds}s (max: {limit_seconds}s)")]
    StaleTimestamp {
        age_seconds: i64,
        limit_seconds: u64,
    },
}

// ============================================================================
// WebhookSecret
// ============================================================================

/// The webhook signing secret shared with the provider.
///
/// Wrapped so the value is zeroed on drop and never leaks through `Debug`
/// output or log lines.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct WebhookSecret(String);

impl WebhookSecret {
    /// Wrap a raw secret value (not Base64 or hex-encoded).
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the raw secret bytes for HMAC keying.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the secret is empty (treated as unset).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("WebhookSecret").field(&"<REDACTED>").finish()
    }
}

// ============================================================================
// Signature validation
// ============================================================================

/// Validate an HMAC-SHA256 webhook signature against the raw request body.
///
/// The expected digest is computed over `payload` keyed by `secret` and
/// compared against the hex digest in `signature`. The comparison is
/// performed in constant time (`hmac::Mac::verify_slice`), never with
/// short-circuiting string equality.
///
/// # Errors
///
/// Returns [`AuthError::InvalidSignature`] when the signature is not valid
/// hex or the digest does not match.
pub fn verify_signature(
    secret: &WebhookSecret,
    payload: &[u8],
    signature: &str,
) -> Result<(), AuthError> {
    type HmacSha256 = Hmac<Sha256>;

    let sig_bytes = hex::decode(signature.trim()).map_err(|_| AuthError::InvalidSignature)?;

    let mut mac = HmacSha256::new_from_slice(secret.expose().as_bytes())
        .map_err(|_| AuthError::InvalidSignature)?;
    mac.update(payload);

    mac.verify_slice(&sig_bytes)
        .map_err(|_| AuthError::InvalidSignature)
}

// ============================================================================
// Replay window
// ============================================================================

/// Validate the payload timestamp against the replay window, using the
/// current wall clock.
///
/// # Errors
///
/// Returns [`AuthError::MissingTimestamp`] when `timestamp_ms` is `None`,
/// or [`AuthError::StaleTimestamp`] when `|now - timestamp|` exceeds
/// `max_age_seconds`.
pub fn check_timestamp(
    timestamp_ms: Option<i64>,
    max_age_seconds: u64,
) -> Result<(), AuthError> {
    check_timestamp_at(timestamp_ms, max_age_seconds, Utc::now().timestamp_millis())
}

/// [`check_timestamp`] with an explicit reference clock, for deterministic
/// window checks.
pub fn check_timestamp_at(
    timestamp_ms: Option<i64>,
    max_age_seconds: u64,
    now_ms: i64,
) -> Result<(), AuthError> {
    let timestamp_ms = timestamp_ms.ok_or(AuthError::MissingTimestamp)?;

    // The sender stamps milliseconds; the window is expressed in seconds.
    let age_seconds = (now_ms - timestamp_ms).abs() / 1000;

    if age_seconds > max_age_seconds as i64 {
        return Err(AuthError::StaleTimestamp {
            age_seconds,
            limit_seconds: max_age_seconds,
        });
    }

    Ok(())
}

#[cfg(test)]
#[path = "validation_tests.rs"]
mod tests;
