//! # Notification Module
//!
//! Outbound result notifications. The dispatcher and runner only see the
//! [`Notifier`] trait; the concrete [`SlackNotifier`] posts to a Slack
//! incoming webhook.
//!
//! [`SlackNotifier`]: slack::SlackNotifier

use crate::engine::ExecutionResult;
use async_trait::async_trait;

pub mod slack;

pub use slack::{SlackConfig, SlackNotifier};

/// Notification failures.
///
/// Notifications are best-effort: callers log these and move on; a failed
/// notification never fails the run it describes.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Notification request failed: {message}")]
    Request { message: String },

    #[error("Notification endpoint returned HTTP {status}")]
    Endpoint { status: u16 },
}

/// Outbound notification capability for completed runs.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Report a completed execution. Implementations decide whether the
    /// result warrants a message at all (e.g. success/error switches).
    async fn notify_result(
        &self,
        result: &ExecutionResult,
        task_description: &str,
    ) -> Result<(), NotifyError>;
}
