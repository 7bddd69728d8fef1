//! # Webhook Processing Module
//!
//! Handles Linear webhook validation, decoding, routing, and dispatch.
//!
//! A delivery flows through the submodules in a fixed order:
//! [`validation`] (signature over the raw body), envelope decode (this
//! module), [`validation`] again (replay window), [`routes`] (rule lookup),
//! [`render`] (prompt construction), and finally [`dispatch`] (detached
//! execution handoff).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub mod dispatch;
pub mod render;
pub mod routes;
pub mod validation;

pub use dispatch::{DispatchOutcome, Dispatcher, RejectReason};
pub use render::render_prompt;
pub use routes::{
    default_routes, ConditionOperator, RouteCondition, RouteFileError, RouteRule, RouteTable,
};
pub use validation::{check_timestamp, verify_signature, AuthError, WebhookSecret};

// ============================================================================
// Headers
// ============================================================================

/// Linear-specific HTTP headers attached to a webhook delivery
///
/// All values are optional at this layer; whether a missing signature is an
/// error depends on whether a secret is configured, and the event/delivery
/// headers are informational (the payload body is authoritative).
#[derive(Debug, Clone, Default)]
pub struct WebhookHeaders {
    pub signature: Option<String>,   // Linear-Signature
    pub event: Option<String>,       // Linear-Event
    pub delivery_id: Option<String>, // Linear-Delivery
}

impl WebhookHeaders {
    /// Parse headers from an HTTP header map
    ///
    /// Lookup is case-insensitive: the map is expected to carry lowercase
    /// keys (as produced by the HTTP layer), with the canonical mixed-case
    /// names accepted as a fallback.
    pub fn from_http_headers(headers: &HashMap<String, String>) -> Self {
        let get = |lower: &str, canonical: &str| {
            headers
                .get(lower)
                .or_else(|| headers.get(canonical))
                .cloned()
        };

        Self {
            signature: get("linear-signature", "Linear-Signature"),
            event: get("linear-event", "Linear-Event"),
            delivery_id: get("linear-delivery", "Linear-Delivery"),
        }
    }
}

// ============================================================================
// Event Payload Model
// ============================================================================

/// Action that triggered a webhook delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventAction {
    Create,
    Update,
    Remove,
}

impl EventAction {
    /// Get the wire-format string for this action
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Remove => "remove",
        }
    }
}

/// Entity kind carried by a webhook delivery
///
/// This is a closed set: a payload carrying an entity type that is not
/// listed here fails to decode and the delivery is rejected with a 400.
/// New provider entity types therefore surface as decode errors rather
/// than being silently ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Issue,
    Comment,
    Project,
    ProjectUpdate,
    Label,
    Cycle,
    Reaction,
    IssueAttachment,
    Document,
    Initiative,
    Customer,
    CustomerRequest,
    User,
    IssueSla,
    OAuthAppRevoked,
}

impl EventKind {
    /// Get the wire-format string for this entity kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Issue => "Issue",
            Self::Comment => "Comment",
            Self::Project => "Project",
            Self::ProjectUpdate => "ProjectUpdate",
            Self::Label => "Label",
            Self::Cycle => "Cycle",
            Self::Reaction => "Reaction",
            Self::IssueAttachment => "IssueAttachment",
            Self::Document => "Document",
            Self::Initiative => "Initiative",
            Self::Customer => "Customer",
            Self::CustomerRequest => "CustomerRequest",
            Self::User => "User",
            Self::IssueSla => "IssueSla",
            Self::OAuthAppRevoked => "OAuthAppRevoked",
        }
    }
}

/// Actor who triggered the webhook event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub actor_type: Option<String>,
}

/// One inbound webhook delivery, decoded from the provider's JSON body
///
/// `data` is deliberately an open map: entity payloads vary by kind and
/// grow over time, and the routing layer addresses into them by dot-path.
/// Only `action` and `type` are decoded strictly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Type of action (create, update, remove)
    pub action: EventAction,

    /// Entity type (Issue, Comment, etc.)
    #[serde(rename = "type")]
    pub kind: EventKind,

    /// User who triggered the event
    #[serde(default)]
    pub actor: Option<Actor>,

    /// ISO 8601 timestamp of the action
    #[serde(rename = "createdAt")]
    pub created_at: String,

    /// The entity's current field values
    pub data: serde_json::Map<String, serde_json::Value>,

    /// URL to the entity
    pub url: String,

    /// Unix timestamp in milliseconds, set by the sender
    ///
    /// Optional at the decode layer so an absent field maps to
    /// [`AuthError::MissingTimestamp`] in the replay check rather than a
    /// generic decode failure.
    #[serde(rename = "webhookTimestamp", default)]
    pub webhook_timestamp: Option<i64>,

    /// Webhook configuration ID
    #[serde(rename = "webhookId")]
    pub webhook_id: String,

    /// Organization ID
    #[serde(rename = "organizationId")]
    pub organization_id: String,

    /// Previous values for update actions, keyed like `data` but holding
    /// only the fields that changed
    #[serde(rename = "updatedFrom", default)]
    pub updated_from: Option<serde_json::Map<String, serde_json::Value>>,
}

impl EventEnvelope {
    /// Decode an envelope from the raw request body
    pub fn from_slice(body: &[u8]) -> Result<Self, PayloadError> {
        serde_json::from_slice(body).map_err(|e| PayloadError::Malformed {
            message: e.to_string(),
        })
    }

    /// Get the canonical key for this event type and action, e.g. `"Issue.create"`
    pub fn event_key(&self) -> String {
        format!("{}.{}", self.kind.as_str(), self.action.as_str())
    }

    /// Get the issue ID if this is an issue-related event
    pub fn issue_id(&self) -> Option<&str> {
        self.issue_field("id")
    }

    /// Get the issue title if this is an issue-related event
    pub fn issue_title(&self) -> Option<&str> {
        self.issue_field("title")
    }

    /// Get the issue description if this is an issue-related event
    pub fn issue_description(&self) -> Option<&str> {
        self.issue_field("description")
    }

    /// Get the issue state name if this is an issue-related event
    pub fn issue_state(&self) -> Option<&str> {
        if self.kind != EventKind::Issue {
            return None;
        }
        self.data.get("state")?.get("name")?.as_str()
    }

    /// Get the issue priority if this is an issue-related event
    pub fn issue_priority(&self) -> Option<i64> {
        if self.kind != EventKind::Issue {
            return None;
        }
        self.data.get("priority")?.as_i64()
    }

    fn issue_field(&self, field: &str) -> Option<&str> {
        if self.kind != EventKind::Issue {
            return None;
        }
        self.data.get(field)?.as_str()
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Failure to decode a webhook body into an [`EventEnvelope`]
///
/// Covers malformed JSON, missing required fields, and unknown values for
/// the strictly-decoded `action`/`type` fields. Maps to HTTP 400.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("Invalid payload: {message}")]
    Malformed { message: String },
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
