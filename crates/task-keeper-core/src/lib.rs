//! # Task-Keeper Core
//!
//! Core business logic for the Task-Keeper webhook-to-agent dispatch service.
//!
//! This crate contains the domain logic for processing Linear webhooks:
//! validating signatures and replay windows, decoding event payloads,
//! matching them against routing rules, rendering prompts, and dispatching
//! budget-gated agent executions.
//!
//! ## Architecture
//!
//! The core follows clean architecture principles:
//! - Business logic depends only on trait abstractions
//!   ([`runner::TaskRunner`], [`runner::BudgetGate`], [`engine::AgentEngine`],
//!   [`notify::Notifier`])
//! - Infrastructure implementations are injected at runtime
//! - The HTTP layer lives in `task-keeper-api` and consumes this crate
//!
//! ## Usage
//!
//! ```rust
//! use task_keeper_core::{CorrelationId, RunId};
//!
//! // Core types are available for use across the system
//! let run_id = RunId::new();
//! let correlation_id = CorrelationId::new();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod engine;
pub mod notify;
pub mod runner;
pub mod tracking;
pub mod webhook;

// Re-export commonly used types
pub use ulid::Ulid;
pub use uuid::Uuid;

// ============================================================================
// Domain Identifier Types
// ============================================================================

/// Unique identifier for a single agent execution
///
/// Uses ULID for lexicographic sorting and global uniqueness, so log lines
/// and ledger entries for concurrent runs sort by start time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Ulid);

impl RunId {
    /// Generate a new unique run ID
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Get string representation of the run ID
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ulid = s.parse::<Ulid>().map_err(|_| ValidationError::InvalidFormat {
            field: "run_id".to_string(),
            message: "expected ULID format".to_string(),
        })?;
        Ok(Self(ulid))
    }
}

/// Correlation identifier for tracking a webhook delivery through the system
///
/// Generated at the HTTP boundary and attached to every log line produced
/// while processing that delivery, including the detached execution unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generate a new correlation ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Validation Errors
// ============================================================================

/// Validation errors for domain values
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A required field was missing or empty
    #[error("Required field missing: {field}")]
    Required { field: String },

    /// A field value did not match the expected format
    #[error("Invalid format for {field}: {message}")]
    InvalidFormat { field: String, message: String },
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
