//! Tests for route rules, condition evaluation, and the route table.

use super::*;
use crate::webhook::tests::sample_payload_json;
use crate::webhook::EventEnvelope;

// ============================================================================
// Helpers
// ============================================================================

fn envelope_from(payload: serde_json::Value) -> EventEnvelope {
    EventEnvelope::from_slice(payload.to_string().as_bytes()).expect("payload should decode")
}

fn envelope() -> EventEnvelope {
    envelope_from(sample_payload_json())
}

fn rule(pattern: &str) -> RouteRule {
    RouteRule {
        event_pattern: pattern.to_string(),
        conditions: Vec::new(),
        prompt_template: "New: {title}".to_string(),
        enabled: true,
        description: None,
    }
}

fn condition(field: &str, operator: ConditionOperator, value: serde_json::Value) -> RouteCondition {
    RouteCondition {
        field: field.to_string(),
        operator,
        value: Some(value),
    }
}

// ============================================================================
// Pattern matching tests
// ============================================================================

mod pattern_tests {
    use super::*;

    /// The bare `*` pattern matches every event key.
    #[test]
    fn test_bare_wildcard_matches_everything() {
        let rule = rule("*");
        let envelope = envelope();

        for key in ["Issue.create", "Comment.remove", "Project", "a.b.c"] {
            assert!(rule.matches(key, &envelope), "`*` should match {key}");
        }
    }

    /// A literal pattern matches exactly its own key and nothing else.
    #[test]
    fn test_literal_pattern_exact_match_only() {
        let rule = rule("Issue.create");
        let envelope = envelope();

        assert!(rule.matches("Issue.create", &envelope));
        assert!(!rule.matches("Issue.update", &envelope));
        assert!(!rule.matches("Comment.create", &envelope));
        assert!(!rule.matches("issue.create", &envelope), "match is case-sensitive");
    }

    /// A wildcard segment matches any value in that position.
    #[test]
    fn test_segment_wildcard() {
        let envelope = envelope();

        let any_action = rule("Issue.*");
        assert!(any_action.matches("Issue.create", &envelope));
        assert!(any_action.matches("Issue.update", &envelope));
        assert!(!any_action.matches("Comment.create", &envelope));

        let any_kind = rule("*.create");
        assert!(any_kind.matches("Issue.create", &envelope));
        assert!(any_kind.matches("Comment.create", &envelope));
        assert!(!any_kind.matches("Issue.update", &envelope));
    }

    /// Wildcards never span segments: a segment-count mismatch is no match.
    #[test]
    fn test_segment_count_mismatch_never_matches() {
        let envelope = envelope();

        assert!(!rule("Issue.*").matches("Issue", &envelope));
        assert!(!rule("Issue.*").matches("Issue.create.extra", &envelope));
        assert!(!rule("*.create.*").matches("Issue.create", &envelope));
    }
}

// ============================================================================
// Condition evaluation tests
// ============================================================================

mod condition_tests {
    use super::*;

    /// `equals` compares the resolved field against the operand.
    #[test]
    fn test_equals() {
        let envelope = envelope();

        assert!(condition(
            "assignee.name",
            ConditionOperator::Equals,
            serde_json::json!("Claude")
        )
        .evaluate(&envelope));

        assert!(!condition(
            "assignee.name",
            ConditionOperator::Equals,
            serde_json::json!("Alice")
        )
        .evaluate(&envelope));
    }

    /// Equality is type-aware: the number 2 is not the string "2".
    #[test]
    fn test_equals_is_type_aware() {
        let envelope = envelope();

        assert!(
            condition("priority", ConditionOperator::Equals, serde_json::json!(2))
                .evaluate(&envelope)
        );
        assert!(!condition(
            "priority",
            ConditionOperator::Equals,
            serde_json::json!("2")
        )
        .evaluate(&envelope));
    }

    /// `not_equals` is the negation of `equals`.
    #[test]
    fn test_not_equals() {
        let envelope = envelope();

        assert!(condition(
            "assignee.name",
            ConditionOperator::NotEquals,
            serde_json::json!("Alice")
        )
        .evaluate(&envelope));
        assert!(!condition(
            "assignee.name",
            ConditionOperator::NotEquals,
            serde_json::json!("Claude")
        )
        .evaluate(&envelope));
    }

    /// `contains` on a string field is a substring test.
    #[test]
    fn test_contains_substring() {
        let envelope = envelope();

        assert!(condition(
            "description",
            ConditionOperator::Contains,
            serde_json::json!("broke")
        )
        .evaluate(&envelope));
        assert!(!condition(
            "description",
            ConditionOperator::Contains,
            serde_json::json!("fixed")
        )
        .evaluate(&envelope));
    }

    /// `contains` on a sequence field is a membership test.
    #[test]
    fn test_contains_membership() {
        let mut payload = sample_payload_json();
        payload["data"]["labels"] = serde_json::json!(["bug", "urgent"]);
        let envelope = envelope_from(payload);

        assert!(
            condition("labels", ConditionOperator::Contains, serde_json::json!("bug"))
                .evaluate(&envelope)
        );
        assert!(!condition(
            "labels",
            ConditionOperator::Contains,
            serde_json::json!("feature")
        )
        .evaluate(&envelope));
    }

    /// `contains` on a non-string, non-sequence field is false.
    #[test]
    fn test_contains_on_scalar_is_false() {
        let envelope = envelope();
        assert!(!condition(
            "priority",
            ConditionOperator::Contains,
            serde_json::json!(2)
        )
        .evaluate(&envelope));
    }

    /// `in` is membership of the field value in the operand sequence.
    #[test]
    fn test_in_operator() {
        let envelope = envelope();

        assert!(condition(
            "state.name",
            ConditionOperator::In,
            serde_json::json!(["Todo", "In Progress"])
        )
        .evaluate(&envelope));
        assert!(!condition(
            "state.name",
            ConditionOperator::In,
            serde_json::json!(["Done"])
        )
        .evaluate(&envelope));
    }

    /// `in` with a non-sequence operand is false.
    #[test]
    fn test_in_with_scalar_operand_is_false() {
        let envelope = envelope();
        assert!(!condition(
            "state.name",
            ConditionOperator::In,
            serde_json::json!("Todo")
        )
        .evaluate(&envelope));
    }

    /// A missing field resolves to "no value": `equals` against a concrete
    /// operand fails, traversal never errors.
    #[test]
    fn test_missing_field_no_value() {
        let envelope = envelope();

        assert!(!condition(
            "nonexistent.path",
            ConditionOperator::Equals,
            serde_json::json!("anything")
        )
        .evaluate(&envelope));
    }

    /// Traversal through a non-map value yields no value rather than an
    /// error.
    #[test]
    fn test_traversal_through_scalar_is_no_value() {
        let envelope = envelope();

        // `title` is a string; descending into it must not panic.
        assert!(!condition(
            "title.sub.key",
            ConditionOperator::Equals,
            serde_json::json!("x")
        )
        .evaluate(&envelope));
    }
}

// ============================================================================
// `changed` operator tests
// ============================================================================

mod changed_tests {
    use super::*;

    fn changed(field: &str) -> RouteCondition {
        RouteCondition {
            field: field.to_string(),
            operator: ConditionOperator::Changed,
            value: None,
        }
    }

    /// A field present in the diff with a different value has changed.
    #[test]
    fn test_changed_field_matches() {
        let mut payload = sample_payload_json();
        payload["action"] = serde_json::json!("update");
        payload["updatedFrom"] = serde_json::json!({ "title": "Old title" });
        let envelope = envelope_from(payload);

        assert!(changed("title").evaluate(&envelope));
    }

    /// Without `updatedFrom` (a non-update action) `changed` is false,
    /// never an error.
    #[test]
    fn test_changed_without_diff_is_false() {
        let envelope = envelope();
        assert!(!changed("title").evaluate(&envelope));
    }

    /// A field absent from `updatedFrom` has not changed, even though its
    /// current value differs from "no value".
    #[test]
    fn test_changed_on_field_absent_from_diff_is_false() {
        let mut payload = sample_payload_json();
        payload["action"] = serde_json::json!("update");
        payload["updatedFrom"] = serde_json::json!({ "priority": 1 });
        let envelope = envelope_from(payload);

        assert!(!changed("title").evaluate(&envelope));
        assert!(changed("priority").evaluate(&envelope));
    }

    /// A diff entry equal to the current value is not a change.
    #[test]
    fn test_diff_with_same_value_is_not_changed() {
        let mut payload = sample_payload_json();
        payload["action"] = serde_json::json!("update");
        payload["updatedFrom"] = serde_json::json!({ "title": "Bug" });
        let envelope = envelope_from(payload);

        assert!(!changed("title").evaluate(&envelope));
    }

    /// Nested paths resolve in the diff with the same dot notation.
    #[test]
    fn test_changed_nested_path() {
        let mut payload = sample_payload_json();
        payload["action"] = serde_json::json!("update");
        payload["updatedFrom"] = serde_json::json!({ "state": { "name": "Backlog" } });
        let envelope = envelope_from(payload);

        assert!(changed("state.name").evaluate(&envelope));
    }
}

// ============================================================================
// Operator decode tests
// ============================================================================

mod operator_decode_tests {
    use super::*;

    /// Known operators deserialize from their snake_case names.
    #[test]
    fn test_known_operators_deserialize() {
        for (text, expected) in [
            ("equals", ConditionOperator::Equals),
            ("not_equals", ConditionOperator::NotEquals),
            ("contains", ConditionOperator::Contains),
            ("in", ConditionOperator::In),
            ("changed", ConditionOperator::Changed),
        ] {
            let parsed: ConditionOperator =
                serde_yaml::from_str(text).expect("operator should parse");
            assert_eq!(parsed, expected, "operator {text}");
        }
    }

    /// An unrecognized operator deserializes to Unknown and never matches,
    /// instead of rejecting the whole route file.
    #[test]
    fn test_unknown_operator_fails_closed() {
        let yaml = "field: title\noperator: regex_match\nvalue: x";
        let parsed: RouteCondition = serde_yaml::from_str(yaml).expect("rule should still parse");

        assert_eq!(parsed.operator, ConditionOperator::Unknown);
        assert!(!parsed.evaluate(&envelope()));
    }

    /// The operator defaults to `equals` when omitted.
    #[test]
    fn test_operator_defaults_to_equals() {
        let yaml = "field: assignee.name\nvalue: Claude";
        let parsed: RouteCondition = serde_yaml::from_str(yaml).expect("should parse");

        assert_eq!(parsed.operator, ConditionOperator::Equals);
        assert!(parsed.evaluate(&envelope()));
    }
}

// ============================================================================
// Route table tests
// ============================================================================

mod route_table_tests {
    use super::*;
    use std::io::Write;

    /// Rules are evaluated in insertion order and the first match wins.
    #[test]
    fn test_first_match_wins() {
        let mut first = rule("Issue.*");
        first.description = Some("first".to_string());
        let mut second = rule("Issue.create");
        second.description = Some("second".to_string());

        let table = RouteTable::new(vec![first, second]);
        let matched = table
            .find_match("Issue.create", &envelope())
            .expect("a rule should match");

        assert_eq!(matched.description.as_deref(), Some("first"));
    }

    /// Disabled rules are skipped without evaluating their conditions.
    #[test]
    fn test_disabled_rules_skipped() {
        let mut disabled = rule("Issue.create");
        disabled.enabled = false;
        let enabled = rule("Issue.*");

        let table = RouteTable::new(vec![disabled, enabled]);
        let matched = table
            .find_match("Issue.create", &envelope())
            .expect("the enabled rule should match");

        assert_eq!(matched.event_pattern, "Issue.*");
    }

    /// A pattern match with a failing condition is treated as no match and
    /// the search continues.
    #[test]
    fn test_failing_condition_falls_through() {
        let mut conditional = rule("Issue.create");
        conditional.conditions = vec![condition(
            "assignee.name",
            ConditionOperator::Equals,
            serde_json::json!("Alice"),
        )];

        let table = RouteTable::new(vec![conditional]);
        assert!(table.find_match("Issue.create", &envelope()).is_none());
    }

    /// All conditions must hold (AND logic).
    #[test]
    fn test_conditions_are_and_combined() {
        let mut conditional = rule("Issue.create");
        conditional.conditions = vec![
            condition(
                "assignee.name",
                ConditionOperator::Equals,
                serde_json::json!("Claude"),
            ),
            condition("priority", ConditionOperator::Equals, serde_json::json!(5)),
        ];

        let table = RouteTable::new(vec![conditional]);
        assert!(
            table.find_match("Issue.create", &envelope()).is_none(),
            "one failing condition must fail the rule"
        );
    }

    /// No rules, or no matching rules, yields None.
    #[test]
    fn test_no_match_is_none() {
        assert!(RouteTable::empty()
            .find_match("Issue.create", &envelope())
            .is_none());

        let table = RouteTable::new(vec![rule("Comment.create")]);
        assert!(table.find_match("Issue.create", &envelope()).is_none());
    }

    /// A well-formed YAML file loads with order preserved.
    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "- event_pattern: Issue.create\n\
             \x20 prompt_template: \"New: {{title}}\"\n\
             - event_pattern: \"*\"\n\
             \x20 prompt_template: Fallback\n\
             \x20 enabled: false\n\
             \x20 description: catch-all\n"
        )
        .unwrap();

        let table = RouteTable::load_from_file(file.path()).expect("file should load");

        assert_eq!(table.len(), 2);
        assert_eq!(table.rules()[0].event_pattern, "Issue.create");
        assert!(table.rules()[0].enabled, "enabled defaults to true");
        assert!(!table.rules()[1].enabled);
        assert_eq!(table.rules()[1].description.as_deref(), Some("catch-all"));
    }

    /// A malformed file degrades to an empty table instead of an error.
    #[test]
    fn test_load_or_empty_on_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "this is: [not a rule list").unwrap();

        let table = RouteTable::load_or_empty(file.path());
        assert!(table.is_empty());
    }

    /// A missing file degrades to an empty table.
    #[test]
    fn test_load_or_empty_on_missing_file() {
        let table = RouteTable::load_or_empty(std::path::Path::new("/nonexistent/routes.yaml"));
        assert!(table.is_empty());
    }

    /// The scaffold rules round-trip through YAML.
    #[test]
    fn test_default_routes_round_trip() {
        let rules = default_routes();
        assert!(!rules.is_empty());

        let yaml = serde_yaml::to_string(&rules).unwrap();
        let parsed: Vec<RouteRule> = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.len(), rules.len());
    }
}
