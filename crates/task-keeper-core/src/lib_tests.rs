//! Tests for the core identifier types.

use super::*;

// ============================================================================
// RunId tests
// ============================================================================

mod run_id_tests {
    use super::*;

    /// Two generated run IDs must never collide.
    #[test]
    fn test_run_ids_are_unique() {
        let a = RunId::new();
        let b = RunId::new();
        assert_ne!(a, b, "consecutive run IDs should be unique");
    }

    /// A run ID round-trips through its string form.
    #[test]
    fn test_run_id_string_round_trip() {
        let id = RunId::new();
        let parsed: RunId = id.as_str().parse().expect("ULID string should parse");
        assert_eq!(id, parsed);
    }

    /// A non-ULID string fails to parse with an InvalidFormat error.
    #[test]
    fn test_run_id_rejects_garbage() {
        let result = "not-a-ulid!".parse::<RunId>();
        assert!(matches!(
            result,
            Err(ValidationError::InvalidFormat { .. })
        ));
    }
}

// ============================================================================
// CorrelationId tests
// ============================================================================

mod correlation_id_tests {
    use super::*;

    /// Correlation IDs are unique per generation.
    #[test]
    fn test_correlation_ids_are_unique() {
        assert_ne!(CorrelationId::new(), CorrelationId::new());
    }

    /// Display renders the underlying UUID.
    #[test]
    fn test_correlation_id_displays_as_uuid() {
        let id = CorrelationId::new();
        let rendered = id.to_string();
        assert_eq!(rendered.len(), 36, "expected hyphenated UUID, got {rendered}");
    }
}

// ============================================================================
// ValidationError tests
// ============================================================================

mod validation_error_tests {
    use super::*;

    /// Error messages carry the offending field name.
    #[test]
    fn test_error_messages_name_the_field() {
        let required = ValidationError::Required {
            field: "secret".to_string(),
        };
        assert!(required.to_string().contains("secret"));

        let invalid = ValidationError::InvalidFormat {
            field: "run_id".to_string(),
            message: "expected ULID format".to_string(),
        };
        assert!(invalid.to_string().contains("run_id"));
        assert!(invalid.to_string().contains("ULID"));
    }
}
