//! Tests for signature verification and the replay window.

use super::*;
use hmac::{Hmac, Mac};
use sha2::Sha256;

// ============================================================================
// Helpers
// ============================================================================

/// Compute the HMAC-SHA256 of `payload` keyed by `secret` as a hex digest,
/// the exact format the provider sends.
fn compute_signature(secret: &str, payload: &[u8]) -> String {
    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

// ============================================================================
// verify_signature tests
// ============================================================================

mod verify_signature_tests {
    use super::*;

    /// Recomputing the digest over an unmodified body with the correct
    /// secret always validates.
    #[test]
    fn test_valid_signature_accepted() {
        let secret = WebhookSecret::new("my-test-secret");
        let payload = b"{\"action\":\"create\"}";
        let signature = compute_signature("my-test-secret", payload);

        assert!(verify_signature(&secret, payload, &signature).is_ok());
    }

    /// Any single-byte body mutation invalidates the signature.
    #[test]
    fn test_single_byte_mutation_rejected() {
        let secret = WebhookSecret::new("my-test-secret");
        let payload = b"{\"action\":\"create\"}".to_vec();
        let signature = compute_signature("my-test-secret", &payload);

        for i in 0..payload.len() {
            let mut mutated = payload.clone();
            mutated[i] ^= 0x01;

            assert_eq!(
                verify_signature(&secret, &mutated, &signature),
                Err(AuthError::InvalidSignature),
                "mutating byte {i} should invalidate the signature"
            );
        }
    }

    /// The wrong secret never validates.
    #[test]
    fn test_wrong_secret_rejected() {
        let payload = b"some payload";
        let signature = compute_signature("correct-secret", payload);

        let wrong = WebhookSecret::new("wrong-secret");
        assert_eq!(
            verify_signature(&wrong, payload, &signature),
            Err(AuthError::InvalidSignature)
        );
    }

    /// A signature that is not valid hex is rejected, not a panic.
    #[test]
    fn test_non_hex_signature_rejected() {
        let secret = WebhookSecret::new("secret");
        assert_eq!(
            verify_signature(&secret, b"payload", "not-valid-hex!!"),
            Err(AuthError::InvalidSignature)
        );
    }

    /// Surrounding whitespace in the header value is tolerated.
    #[test]
    fn test_whitespace_around_signature_tolerated() {
        let secret = WebhookSecret::new("my-test-secret");
        let payload = b"body";
        let signature = format!(" {}\n", compute_signature("my-test-secret", payload));

        assert!(verify_signature(&secret, payload, &signature).is_ok());
    }

    /// An empty payload still signs and validates (edge case).
    #[test]
    fn test_empty_payload_validates() {
        let secret = WebhookSecret::new("empty-secret");
        let signature = compute_signature("empty-secret", b"");

        assert!(verify_signature(&secret, b"", &signature).is_ok());
    }
}

// ============================================================================
// check_timestamp tests
// ============================================================================

mod check_timestamp_tests {
    use super::*;

    const NOW_MS: i64 = 1_748_779_200_000;

    /// A delivery 59 seconds old is inside the default 60-second window.
    #[test]
    fn test_59s_old_accepted() {
        let ts = NOW_MS - 59_000;
        assert!(check_timestamp_at(Some(ts), 60, NOW_MS).is_ok());
    }

    /// A delivery 61 seconds old is outside the default window.
    #[test]
    fn test_61s_old_rejected() {
        let ts = NOW_MS - 61_000;
        let result = check_timestamp_at(Some(ts), 60, NOW_MS);

        match result {
            Err(AuthError::StaleTimestamp {
                age_seconds,
                limit_seconds,
            }) => {
                assert_eq!(age_seconds, 61);
                assert_eq!(limit_seconds, 60);
            }
            other => panic!("expected StaleTimestamp, got {other:?}"),
        }
    }

    /// Exactly at the limit is still accepted (the window is exceeded, not
    /// reached).
    #[test]
    fn test_exactly_at_limit_accepted() {
        let ts = NOW_MS - 60_000;
        assert!(check_timestamp_at(Some(ts), 60, NOW_MS).is_ok());
    }

    /// Clock skew into the future counts against the window too.
    #[test]
    fn test_future_timestamp_rejected() {
        let ts = NOW_MS + 61_000;
        assert!(matches!(
            check_timestamp_at(Some(ts), 60, NOW_MS),
            Err(AuthError::StaleTimestamp { .. })
        ));
    }

    /// A missing timestamp is its own error.
    #[test]
    fn test_missing_timestamp_rejected() {
        assert_eq!(
            check_timestamp_at(None, 60, NOW_MS),
            Err(AuthError::MissingTimestamp)
        );
    }

    /// The wall-clock entry point accepts a timestamp of "now".
    #[test]
    fn test_current_timestamp_accepted() {
        let now_ms = chrono::Utc::now().timestamp_millis();
        assert!(check_timestamp(Some(now_ms), 60).is_ok());
    }
}

// ============================================================================
// WebhookSecret tests
// ============================================================================

mod webhook_secret_tests {
    use super::*;

    /// The `Debug` output must not reveal the secret.
    #[test]
    fn test_debug_redacts_secret() {
        let secret = WebhookSecret::new("top-secret-value");
        let debug_str = format!("{:?}", secret);

        assert!(
            !debug_str.contains("top-secret-value"),
            "secret must not appear in debug output; got: {debug_str}"
        );
        assert!(debug_str.contains("<REDACTED>"));
    }

    /// Emptiness is how "configured but blank" is detected.
    #[test]
    fn test_empty_detection() {
        assert!(WebhookSecret::new("").is_empty());
        assert!(!WebhookSecret::new("x").is_empty());
    }
}
