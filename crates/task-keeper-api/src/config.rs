//! Configuration types for the HTTP service

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use task_keeper_core::webhook::validation::DEFAULT_MAX_TIMESTAMP_AGE_SECONDS;

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Webhook processing settings
    pub webhook: WebhookConfig,

    /// Agent engine settings
    pub agent: AgentConfig,

    /// Slack notification settings
    pub slack: task_keeper_core::notify::SlackConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Validate cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<(), crate::errors::ConfigError> {
        if self.server.port == 0 {
            return Err(crate::errors::ConfigError::Invalid {
                message: "server.port must be non-zero".to_string(),
            });
        }

        if self.webhook.max_timestamp_age_seconds == 0 {
            return Err(crate::errors::ConfigError::Invalid {
                message: "webhook.max_timestamp_age_seconds must be non-zero".to_string(),
            });
        }

        if self.agent.timeout_seconds == 0 {
            return Err(crate::errors::ConfigError::Invalid {
                message: "agent.timeout_seconds must be non-zero".to_string(),
            });
        }

        if let Some(budget) = self.agent.max_budget_usd {
            if budget < 0.0 {
                return Err(crate::errors::ConfigError::Invalid {
                    message: "agent.max_budget_usd must not be negative".to_string(),
                });
            }
        }

        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,

    /// Enable CORS
    pub enable_cors: bool,

    /// Enable compression
    pub enable_compression: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout_seconds: 30,
            enable_cors: true,
            enable_compression: true,
        }
    }
}

/// Webhook processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Webhook signing secret; empty or absent disables signature
    /// validation (insecure mode, logged per delivery)
    pub secret: Option<String>,

    /// Maximum age of a delivery's timestamp in seconds
    pub max_timestamp_age_seconds: u64,

    /// YAML file containing webhook route rules
    pub routes_file: Option<PathBuf>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            secret: None,
            max_timestamp_age_seconds: DEFAULT_MAX_TIMESTAMP_AGE_SECONDS,
            routes_file: None,
        }
    }
}

/// Agent engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Agent binary name or path
    pub binary: String,

    /// Model alias or ID
    pub model: String,

    /// Optional cap on conversation turns
    pub max_turns: Option<u32>,

    /// Hard wall-clock limit for one run in seconds
    pub timeout_seconds: u64,

    /// Working directory for agent processes
    pub working_dir: Option<PathBuf>,

    /// Cumulative budget limit in USD; absent means unlimited
    pub max_budget_usd: Option<f64>,

    /// Path of the JSON cost ledger; absent disables persistence
    pub cost_ledger: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            binary: "claude".to_string(),
            model: "sonnet".to_string(),
            max_turns: None,
            timeout_seconds: 600,
            working_dir: None,
            max_budget_usd: None,
            cost_ledger: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
