//! Prompt rendering: substituting envelope data into a rule's template.
//!
//! Templates use `{name}` placeholders over a fixed context built from the
//! envelope. Rendering never drops an event: a template referencing a key
//! the context does not have produces an error marker prefixed to the
//! original template text, so the operator sees both the failure and the
//! original intent.

use crate::webhook::EventEnvelope;
use std::collections::HashMap;

/// Render a prompt template against a webhook envelope.
///
/// The context exposes `action`, `type`, `url`, `title`, `description`,
/// `state`, `priority`, `actor_name`, and `data` (the raw entity payload as
/// compact JSON). Issue-specific keys are empty (or `0` for priority) for
/// other entity kinds.
pub fn render_prompt(template: &str, envelope: &EventEnvelope) -> String {
    let context = build_context(envelope);

    match substitute(template, &context) {
        Ok(rendered) => rendered,
        Err(missing_key) => format!(
            "[Template Error: Missing key `{missing_key}`]\n\n{template}"
        ),
    }
}

/// Build the named-value context for template rendering.
fn build_context(envelope: &EventEnvelope) -> HashMap<&'static str, String> {
    let mut context = HashMap::new();

    context.insert("action", envelope.action.as_str().to_string());
    context.insert("type", envelope.kind.as_str().to_string());
    context.insert("url", envelope.url.clone());
    context.insert(
        "title",
        envelope.issue_title().unwrap_or_default().to_string(),
    );
    context.insert(
        "description",
        envelope.issue_description().unwrap_or_default().to_string(),
    );
    context.insert(
        "state",
        envelope.issue_state().unwrap_or_default().to_string(),
    );
    context.insert(
        "priority",
        envelope.issue_priority().unwrap_or(0).to_string(),
    );
    context.insert(
        "actor_name",
        envelope
            .actor
            .as_ref()
            .and_then(|a| a.name.clone())
            .unwrap_or_else(|| "Unknown".to_string()),
    );
    context.insert(
        "data",
        serde_json::Value::Object(envelope.data.clone()).to_string(),
    );

    context
}

/// Substitute `{name}` placeholders from the context.
///
/// `{{` escapes a literal brace. Returns the first missing key as an error
/// so the caller can fall back to the marker form.
fn substitute(
    template: &str,
    context: &HashMap<&'static str, String>,
) -> Result<String, String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        // `{{` renders a literal brace.
        if let Some(stripped) = after.strip_prefix('{') {
            out.push('{');
            rest = stripped;
            continue;
        }

        // An unterminated `{` is emitted literally rather than erroring.
        let Some(close) = after.find('}') else {
            out.push('{');
            rest = after;
            continue;
        };

        let name = &after[..close];
        match context.get(name) {
            Some(value) => out.push_str(value),
            None => return Err(name.to_string()),
        }

        rest = &after[close + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
#[path = "render_tests.rs"]
mod tests;
