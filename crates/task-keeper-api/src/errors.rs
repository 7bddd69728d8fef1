//! Error types for the HTTP service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use task_keeper_core::webhook::{AuthError, RejectReason};
use tracing::warn;

/// Webhook handler errors with HTTP status code mapping
///
/// Maps dispatch rejections to transport-level codes following the
/// contract the provider sees:
///
/// - `401 Unauthorized`: bad or missing signature (the body was never
///   interpreted)
/// - `400 Bad Request`: malformed payload, missing or stale timestamp
/// - `404 Not Found`: unknown `{provider}` URL segment
///
/// Everything after acknowledgment (budget refusals, engine failures) is
/// logged by the execution unit and never surfaces here.
#[derive(Debug, thiserror::Error)]
pub enum WebhookHandlerError {
    /// The delivery failed authentication or decoding
    #[error("Webhook rejected: {0}")]
    Rejected(#[from] RejectReason),

    /// Webhook provider not found
    ///
    /// Occurs when the `{provider}` URL segment does not name a configured
    /// provider; only `linear` is registered.
    #[error("Webhook provider not found: {provider}")]
    ProviderNotFound { provider: String },
}

impl WebhookHandlerError {
    /// The HTTP status this error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            // Signature failures are authentication failures; timestamp and
            // decode failures are malformed-request failures.
            Self::Rejected(RejectReason::Auth(
                AuthError::InvalidSignature | AuthError::MissingSignatureHeader,
            )) => StatusCode::UNAUTHORIZED,
            Self::Rejected(_) => StatusCode::BAD_REQUEST,
            Self::ProviderNotFound { .. } => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for WebhookHandlerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();

        match &self {
            Self::Rejected(reason) => {
                warn!(status = status.as_u16(), reason = %reason, "Rejecting webhook delivery");
            }
            Self::ProviderNotFound { provider } => {
                warn!(provider = %provider, "Webhook provider not found");
            }
        }

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        (status, Json(body)).into_response()
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Configuration parsing failed: {0}")]
    Parsing(#[from] toml::de::Error),
}
