//! Typed response bodies for the HTTP service

use serde::{Deserialize, Serialize};

/// Response for `POST /webhooks/{provider}`
///
/// `status` is `"accepted"` when a rule matched and an execution was
/// spawned, or `"ignored"` when the delivery was valid but no route is
/// configured for it; both are HTTP 200.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_key: Option<String>,
}

impl WebhookResponse {
    /// An accepted delivery: a rule matched and an execution was spawned.
    pub fn accepted(event_key: String) -> Self {
        Self {
            status: "accepted".to_string(),
            message: format!("Agent triggered for {event_key}"),
            event_key: Some(event_key),
        }
    }

    /// A valid delivery with no configured route.
    pub fn ignored(reason: String) -> Self {
        Self {
            status: "ignored".to_string(),
            message: reason,
            event_key: None,
        }
    }
}

/// Response for `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Response for `POST /admin/routes/reload`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReloadRoutesResponse {
    pub status: String,
    pub rules_loaded: usize,
}

/// Response for `GET /admin/routes`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutesResponse {
    pub rules: Vec<RouteRuleSummary>,
}

/// One rule in the `GET /admin/routes` listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRuleSummary {
    pub event_pattern: String,
    pub enabled: bool,
    pub conditions: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
