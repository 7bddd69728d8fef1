//! Tests for webhook headers and the event payload model.

use super::*;

// ============================================================================
// Helpers
// ============================================================================

/// A fully-populated Issue.create payload as Linear would deliver it.
pub(crate) fn sample_payload_json() -> serde_json::Value {
    serde_json::json!({
        "action": "create",
        "type": "Issue",
        "actor": { "id": "actor-1", "name": "Alice", "type": "user" },
        "createdAt": "2025-06-01T12:00:00.000Z",
        "data": {
            "id": "issue-1",
            "title": "Bug",
            "description": "Something broke",
            "priority": 2,
            "state": { "name": "Todo" },
            "assignee": { "name": "Claude" }
        },
        "url": "https://linear.app/team/issue/ISS-1",
        "webhookTimestamp": 1748779200000_i64,
        "webhookId": "wh-1",
        "organizationId": "org-1"
    })
}

pub(crate) fn sample_envelope() -> EventEnvelope {
    EventEnvelope::from_slice(sample_payload_json().to_string().as_bytes())
        .expect("sample payload should decode")
}

// ============================================================================
// WebhookHeaders tests
// ============================================================================

mod webhook_headers_tests {
    use super::*;

    /// Lowercase header keys (as normalized by the HTTP layer) are found.
    #[test]
    fn test_lowercase_headers_extracted() {
        let mut map = HashMap::new();
        map.insert("linear-signature".to_string(), "abc123".to_string());
        map.insert("linear-event".to_string(), "Issue".to_string());
        map.insert("linear-delivery".to_string(), "d-1".to_string());

        let headers = WebhookHeaders::from_http_headers(&map);

        assert_eq!(headers.signature.as_deref(), Some("abc123"));
        assert_eq!(headers.event.as_deref(), Some("Issue"));
        assert_eq!(headers.delivery_id.as_deref(), Some("d-1"));
    }

    /// Canonical mixed-case names work as a fallback.
    #[test]
    fn test_canonical_case_headers_extracted() {
        let mut map = HashMap::new();
        map.insert("Linear-Signature".to_string(), "abc123".to_string());

        let headers = WebhookHeaders::from_http_headers(&map);
        assert_eq!(headers.signature.as_deref(), Some("abc123"));
    }

    /// Absent headers yield None rather than an error.
    #[test]
    fn test_missing_headers_are_none() {
        let headers = WebhookHeaders::from_http_headers(&HashMap::new());
        assert!(headers.signature.is_none());
        assert!(headers.event.is_none());
        assert!(headers.delivery_id.is_none());
    }
}

// ============================================================================
// Envelope decode tests
// ============================================================================

mod envelope_decode_tests {
    use super::*;

    /// A well-formed payload decodes with every field populated.
    #[test]
    fn test_full_payload_decodes() {
        let envelope = sample_envelope();

        assert_eq!(envelope.action, EventAction::Create);
        assert_eq!(envelope.kind, EventKind::Issue);
        assert_eq!(envelope.url, "https://linear.app/team/issue/ISS-1");
        assert_eq!(envelope.webhook_timestamp, Some(1748779200000));
        assert_eq!(envelope.webhook_id, "wh-1");
        assert_eq!(envelope.organization_id, "org-1");
        assert!(envelope.updated_from.is_none());

        let actor = envelope.actor.expect("actor should be present");
        assert_eq!(actor.name.as_deref(), Some("Alice"));
    }

    /// The event key is `{type}.{action}`.
    #[test]
    fn test_event_key_format() {
        assert_eq!(sample_envelope().event_key(), "Issue.create");
    }

    /// An unknown entity type is rejected at decode time (fail closed).
    #[test]
    fn test_unknown_entity_type_rejected() {
        let mut payload = sample_payload_json();
        payload["type"] = serde_json::json!("Galaxy");

        let result = EventEnvelope::from_slice(payload.to_string().as_bytes());
        assert!(
            matches!(result, Err(PayloadError::Malformed { .. })),
            "unknown entity type must fail decode, got {result:?}"
        );
    }

    /// An unknown action is rejected at decode time.
    #[test]
    fn test_unknown_action_rejected() {
        let mut payload = sample_payload_json();
        payload["action"] = serde_json::json!("archive");

        let result = EventEnvelope::from_slice(payload.to_string().as_bytes());
        assert!(matches!(result, Err(PayloadError::Malformed { .. })));
    }

    /// A missing required field (url) is a decode error.
    #[test]
    fn test_missing_required_field_rejected() {
        let mut payload = sample_payload_json();
        payload.as_object_mut().unwrap().remove("url");

        let result = EventEnvelope::from_slice(payload.to_string().as_bytes());
        assert!(matches!(result, Err(PayloadError::Malformed { .. })));
    }

    /// A missing webhookTimestamp decodes fine; the replay check owns that
    /// failure mode.
    #[test]
    fn test_missing_timestamp_still_decodes() {
        let mut payload = sample_payload_json();
        payload.as_object_mut().unwrap().remove("webhookTimestamp");

        let envelope = EventEnvelope::from_slice(payload.to_string().as_bytes())
            .expect("timestamp is optional at the decode layer");
        assert!(envelope.webhook_timestamp.is_none());
    }

    /// Non-JSON bytes are a decode error, never a panic.
    #[test]
    fn test_garbage_body_rejected() {
        let result = EventEnvelope::from_slice(b"not json at all");
        assert!(matches!(result, Err(PayloadError::Malformed { .. })));
    }

    /// `updatedFrom` decodes for update actions.
    #[test]
    fn test_updated_from_decodes() {
        let mut payload = sample_payload_json();
        payload["action"] = serde_json::json!("update");
        payload["updatedFrom"] = serde_json::json!({ "title": "Old title" });

        let envelope =
            EventEnvelope::from_slice(payload.to_string().as_bytes()).expect("should decode");

        let updated_from = envelope.updated_from.expect("updatedFrom should be present");
        assert_eq!(
            updated_from.get("title").and_then(|v| v.as_str()),
            Some("Old title")
        );
    }
}

// ============================================================================
// Accessor tests
// ============================================================================

mod accessor_tests {
    use super::*;

    /// Issue accessors read the expected fields.
    #[test]
    fn test_issue_accessors() {
        let envelope = sample_envelope();

        assert_eq!(envelope.issue_id(), Some("issue-1"));
        assert_eq!(envelope.issue_title(), Some("Bug"));
        assert_eq!(envelope.issue_description(), Some("Something broke"));
        assert_eq!(envelope.issue_state(), Some("Todo"));
        assert_eq!(envelope.issue_priority(), Some(2));
    }

    /// Issue accessors return None for non-issue events even when the data
    /// map has look-alike fields.
    #[test]
    fn test_accessors_none_for_other_kinds() {
        let mut payload = sample_payload_json();
        payload["type"] = serde_json::json!("Comment");

        let envelope =
            EventEnvelope::from_slice(payload.to_string().as_bytes()).expect("should decode");

        assert_eq!(envelope.issue_title(), None);
        assert_eq!(envelope.issue_state(), None);
        assert_eq!(envelope.issue_priority(), None);
    }

    /// A non-object `state` value yields None instead of panicking.
    #[test]
    fn test_scalar_state_yields_none() {
        let mut payload = sample_payload_json();
        payload["data"]["state"] = serde_json::json!("Todo");

        let envelope =
            EventEnvelope::from_slice(payload.to_string().as_bytes()).expect("should decode");
        assert_eq!(envelope.issue_state(), None);
    }
}
