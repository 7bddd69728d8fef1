//! Slack result notifications via incoming webhook.

use super::{Notifier, NotifyError};
use crate::engine::ExecutionResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

// ============================================================================
// Configuration
// ============================================================================

/// Slack notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Enable Slack notifications
    #[serde(default)]
    pub enabled: bool,

    /// Slack incoming-webhook URL
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Override channel (optional)
    #[serde(default)]
    pub channel: Option<String>,

    /// Bot username
    #[serde(default = "default_username")]
    pub username: String,

    /// Bot emoji icon
    #[serde(default = "default_icon")]
    pub icon_emoji: String,

    /// Notify on successful completion
    #[serde(default = "default_true")]
    pub notify_on_success: bool,

    /// Notify on errors
    #[serde(default = "default_true")]
    pub notify_on_error: bool,

    /// Include cost info in the message
    #[serde(default = "default_true")]
    pub include_cost: bool,

    /// Include duration in the message
    #[serde(default = "default_true")]
    pub include_duration: bool,
}

fn default_username() -> String {
    "Task Keeper".to_string()
}

fn default_icon() -> String {
    ":robot_face:".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook_url: None,
            channel: None,
            username: default_username(),
            icon_emoji: default_icon(),
            notify_on_success: true,
            notify_on_error: true,
            include_cost: true,
            include_duration: true,
        }
    }
}

// ============================================================================
// SlackNotifier
// ============================================================================

/// Sends run results to Slack via an incoming webhook.
pub struct SlackNotifier {
    config: SlackConfig,
    client: reqwest::Client,
}

impl SlackNotifier {
    /// Create a notifier from configuration.
    pub fn new(config: SlackConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self { config, client }
    }

    /// Whether this notifier will send anything at all.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled && self.config.webhook_url.is_some()
    }

    /// Post a message to the configured webhook.
    pub async fn send_message(
        &self,
        text: &str,
        blocks: Option<Vec<Value>>,
    ) -> Result<(), NotifyError> {
        let Some(webhook_url) = self.config.webhook_url.as_deref() else {
            return Ok(());
        };

        let mut payload = json!({
            "text": text,
            "username": self.config.username,
            "icon_emoji": self.config.icon_emoji,
        });

        if let Some(channel) = &self.config.channel {
            payload["channel"] = json!(channel);
        }

        if let Some(blocks) = blocks {
            payload["blocks"] = Value::Array(blocks);
        }

        let response = self
            .client
            .post(webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError::Request {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(NotifyError::Endpoint {
                status: response.status().as_u16(),
            });
        }

        Ok(())
    }

    /// Build the rich message blocks for a run result.
    fn build_result_blocks(&self, result: &ExecutionResult, task_description: &str) -> Vec<Value> {
        let (status_emoji, status_text) = if result.is_success() {
            (":white_check_mark:", "Success".to_string())
        } else {
            (":x:", format!("Error: {}", result.status.as_str()))
        };

        let mut blocks = vec![json!({
            "type": "header",
            "text": {
                "type": "plain_text",
                "text": format!("{status_emoji} Agent Execution {status_text}"),
                "emoji": true,
            },
        })];

        if !task_description.is_empty() {
            let truncated = if task_description.chars().count() > 200 {
                let head: String = task_description.chars().take(200).collect();
                format!("{head}...")
            } else {
                task_description.to_string()
            };
            blocks.push(json!({
                "type": "section",
                "text": { "type": "mrkdwn", "text": format!("*Task:* {truncated}") },
            }));
        }

        let mut metrics = Vec::new();
        if self.config.include_duration {
            metrics.push(format!(
                "*Duration:* {:.2}s",
                result.duration_ms as f64 / 1000.0
            ));
        }
        if self.config.include_cost {
            metrics.push(format!("*Cost:* ${:.4}", result.cost_usd));
        }
        metrics.push(format!("*Turns:* {}", result.num_turns));
        metrics.push(format!("*Tokens:* {}", result.usage.total_tokens()));
        if let Some(session_id) = &result.session_id {
            let short: String = session_id.chars().take(12).collect();
            metrics.push(format!("*Session:* `{short}...`"));
        }

        blocks.push(json!({
            "type": "section",
            "text": { "type": "mrkdwn", "text": metrics.join("\n") },
        }));

        if let Some(error) = &result.error {
            blocks.push(json!({
                "type": "section",
                "text": { "type": "mrkdwn", "text": format!("*Error:* {error}") },
            }));
        }

        blocks
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn notify_result(
        &self,
        result: &ExecutionResult,
        task_description: &str,
    ) -> Result<(), NotifyError> {
        if !self.is_enabled() {
            return Ok(());
        }

        if result.is_success() && !self.config.notify_on_success {
            debug!("Skipping success notification (disabled)");
            return Ok(());
        }

        if !result.is_success() && !self.config.notify_on_error {
            debug!("Skipping error notification (disabled)");
            return Ok(());
        }

        let fallback = if result.is_success() {
            format!("Agent execution succeeded: {task_description}")
        } else {
            format!("Agent execution failed: {task_description}")
        };

        let blocks = self.build_result_blocks(result, task_description);
        self.send_message(&fallback, Some(blocks)).await
    }
}

impl std::fmt::Debug for SlackNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackNotifier")
            .field("enabled", &self.config.enabled)
            .field("channel", &self.config.channel)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "slack_tests.rs"]
mod tests;
