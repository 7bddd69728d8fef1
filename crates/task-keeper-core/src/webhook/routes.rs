//! Route rules: mapping webhook events to agent prompt templates.
//!
//! A route table is an ordered list of rules loaded wholesale from a YAML
//! file. Matching is first-match-wins in file order; a rule matches when its
//! event pattern matches the delivery's event key and every one of its
//! conditions holds.

use crate::webhook::EventEnvelope;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::{error, info, warn};

// ============================================================================
// Conditions
// ============================================================================

/// Comparison operator for a route condition
///
/// Unrecognized operator strings deserialize to [`Unknown`], which never
/// matches. A misconfigured rule therefore fails closed instead of taking
/// the whole route file down.
///
/// [`Unknown`]: ConditionOperator::Unknown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    In,
    Changed,
    #[serde(other)]
    Unknown,
}

/// Condition to filter webhook events based on field values.
///
/// Example (YAML):
///
/// ```yaml
/// field: assignee.name
/// operator: equals
/// value: Claude
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteCondition {
    /// Dot-notation path into the envelope's `data` map (e.g. `assignee.name`)
    pub field: String,

    /// Comparison operator; defaults to `equals`
    #[serde(default = "default_operator")]
    pub operator: ConditionOperator,

    /// Value to compare against; ignored by `changed`
    #[serde(default)]
    pub value: Option<Value>,
}

fn default_operator() -> ConditionOperator {
    ConditionOperator::Equals
}

impl RouteCondition {
    /// Evaluate this condition against a webhook envelope.
    ///
    /// Total: traversal through missing keys or non-map values yields "no
    /// value" rather than an error, and an unknown operator is simply false.
    pub fn evaluate(&self, envelope: &EventEnvelope) -> bool {
        let field_value = lookup_path(&envelope.data, &self.field);

        match self.operator {
            ConditionOperator::Equals => field_value == self.value.as_ref(),
            ConditionOperator::NotEquals => field_value != self.value.as_ref(),
            ConditionOperator::Contains => {
                let Some(needle) = self.value.as_ref() else {
                    return false;
                };
                match field_value {
                    Some(Value::String(haystack)) => {
                        haystack.contains(value_as_str(needle).as_ref())
                    }
                    Some(Value::Array(items)) => items.contains(needle),
                    _ => false,
                }
            }
            ConditionOperator::In => match self.value.as_ref() {
                Some(Value::Array(items)) => {
                    field_value.is_some_and(|fv| items.contains(fv))
                }
                _ => false,
            },
            ConditionOperator::Changed => {
                // Compares against the previous-value diff; the `value`
                // operand is ignored. A field the diff does not mention has
                // not changed, and a non-update action (no diff at all)
                // never matches.
                let Some(previous) = envelope.updated_from.as_ref() else {
                    return false;
                };
                match lookup_path(previous, &self.field) {
                    Some(old_value) => Some(old_value) != field_value,
                    None => false,
                }
            }
            ConditionOperator::Unknown => false,
        }
    }
}

/// Resolve a dot-notation path against a JSON object.
///
/// Returns `None` when any intermediate segment is missing or is not an
/// object; never errors.
pub(crate) fn lookup_path<'a>(
    data: &'a serde_json::Map<String, Value>,
    path: &str,
) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = data.get(segments.next()?)?;

    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }

    Some(current)
}

/// Render a comparison operand as the string used for substring tests.
///
/// Strings compare by their content, not their JSON rendering; other scalar
/// operands fall back to their JSON text (`5` matches `"priority 5"`).
fn value_as_str(value: &Value) -> std::borrow::Cow<'_, str> {
    match value {
        Value::String(s) => std::borrow::Cow::Borrowed(s),
        other => std::borrow::Cow::Owned(other.to_string()),
    }
}

// ============================================================================
// Route Rules
// ============================================================================

/// Routing rule mapping webhook events to an agent prompt template.
///
/// Example (YAML):
///
/// ```yaml
/// event_pattern: Issue.update
/// conditions:
///   - field: assignee.name
///     operator: equals
///     value: Claude
/// prompt_template: "Work on this issue: {title}"
/// enabled: true
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRule {
    /// Event pattern to match (e.g. `Issue.create`, `Issue.*`, `*`)
    pub event_pattern: String,

    /// Additional conditions to filter events (AND logic)
    #[serde(default)]
    pub conditions: Vec<RouteCondition>,

    /// Prompt template with `{name}` placeholders for webhook data
    pub prompt_template: String,

    /// Whether this rule is active; disabled rules are skipped entirely
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Human-readable description
    #[serde(default)]
    pub description: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl RouteRule {
    /// Check whether this rule matches the given event key and envelope.
    ///
    /// Conditions are only evaluated after the pattern matches; an empty
    /// condition list trivially passes.
    pub fn matches(&self, event_key: &str, envelope: &EventEnvelope) -> bool {
        if !self.matches_pattern(event_key) {
            return false;
        }

        self.conditions.iter().all(|c| c.evaluate(envelope))
    }

    /// Segment-wise pattern match.
    ///
    /// The bare pattern `*` matches any key. Otherwise both sides are split
    /// on `.`; a differing segment count never matches (wildcards do not
    /// span segments), and each pattern segment must equal the event
    /// segment or be `*`.
    fn matches_pattern(&self, event_key: &str) -> bool {
        if self.event_pattern == "*" {
            return true;
        }

        if self.event_pattern.contains('*') {
            let pattern_parts: Vec<&str> = self.event_pattern.split('.').collect();
            let event_parts: Vec<&str> = event_key.split('.').collect();

            if pattern_parts.len() != event_parts.len() {
                return false;
            }

            return pattern_parts
                .iter()
                .zip(event_parts.iter())
                .all(|(pattern_part, event_part)| {
                    *pattern_part == "*" || pattern_part == event_part
                });
        }

        self.event_pattern == event_key
    }
}

// ============================================================================
// Route Table
// ============================================================================

/// Errors loading a route file
#[derive(Debug, thiserror::Error)]
pub enum RouteFileError {
    #[error("Route file not found: {path}")]
    NotFound { path: String },

    #[error("Failed to read route file {path}: {message}")]
    Io { path: String, message: String },

    #[error("Invalid route file {path}: {message}")]
    Parse { path: String, message: String },
}

/// Ordered collection of route rules.
///
/// Immutable once built; reloads construct a fresh table and replace the
/// old one wholesale (see [`Dispatcher::reload_routes`]), so concurrent
/// readers only ever observe a complete before or after snapshot.
///
/// [`Dispatcher::reload_routes`]: crate::webhook::dispatch::Dispatcher::reload_routes
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    /// Build a table from an ordered rule list.
    pub fn new(rules: Vec<RouteRule>) -> Self {
        Self { rules }
    }

    /// An empty table; matches nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load a table from a YAML file.
    ///
    /// The file is an ordered list of rule records; order is significant
    /// because matching is first-match-wins.
    pub fn load_from_file(path: &Path) -> Result<Self, RouteFileError> {
        if !path.exists() {
            return Err(RouteFileError::NotFound {
                path: path.display().to_string(),
            });
        }

        let contents = std::fs::read_to_string(path).map_err(|e| RouteFileError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let rules: Vec<RouteRule> =
            serde_yaml::from_str(&contents).map_err(|e| RouteFileError::Parse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        Ok(Self::new(rules))
    }

    /// Load a table from a YAML file, falling back to an empty table on any
    /// failure.
    ///
    /// A malformed or missing route file must not take the server down; it
    /// degrades to "no rules match anything" with an error in the log.
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load_from_file(path) {
            Ok(table) => {
                info!(
                    path = %path.display(),
                    rules = table.len(),
                    "Loaded webhook routing rules"
                );
                table
            }
            Err(RouteFileError::NotFound { path }) => {
                warn!(path = %path, "Webhook routes file not found; no rules loaded");
                Self::empty()
            }
            Err(e) => {
                error!(error = %e, "Failed to load webhook routes; no rules loaded");
                Self::empty()
            }
        }
    }

    /// Resolve the first matching enabled rule for an incoming event.
    ///
    /// Iterates rules in file order; disabled rules are skipped without
    /// evaluating their pattern or conditions. Absence of a match is a
    /// normal outcome, not an error.
    pub fn find_match(&self, event_key: &str, envelope: &EventEnvelope) -> Option<&RouteRule> {
        self.rules
            .iter()
            .find(|rule| rule.enabled && rule.matches(event_key, envelope))
    }

    /// All rules, in file order.
    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    /// Number of rules (enabled or not).
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the table has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Default routing rules, used to scaffold a new route file.
pub fn default_routes() -> Vec<RouteRule> {
    vec![
        RouteRule {
            event_pattern: "Issue.create".to_string(),
            conditions: Vec::new(),
            prompt_template: "A new issue was created in Linear:\n\n\
                              Title: {title}\n\
                              Description: {description}\n\
                              URL: {url}\n\n\
                              Please analyze this issue and provide insights."
                .to_string(),
            enabled: true,
            description: Some("Handle new issue creation".to_string()),
        },
        RouteRule {
            event_pattern: "Issue.update".to_string(),
            conditions: Vec::new(),
            prompt_template: "An issue was updated in Linear:\n\n\
                              Title: {title}\n\
                              State: {state}\n\
                              Priority: {priority}\n\
                              URL: {url}\n\n\
                              Please check if any action is needed."
                .to_string(),
            enabled: true,
            description: Some("Handle issue updates".to_string()),
        },
        RouteRule {
            event_pattern: "Comment.create".to_string(),
            conditions: Vec::new(),
            prompt_template: "A new comment was added:\n\n\
                              {data}\n\n\
                              URL: {url}\n\n\
                              Please review this comment."
                .to_string(),
            enabled: true,
            description: Some("Handle new comments".to_string()),
        },
    ]
}

#[cfg(test)]
#[path = "routes_tests.rs"]
mod tests;
