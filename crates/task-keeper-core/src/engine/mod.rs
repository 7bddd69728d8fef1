//! # Agent Engine Module
//!
//! The execution boundary: a trait abstraction over "run this prompt
//! through the agent and report what happened", plus the result types
//! shared by the runner, cost tracker, and notifiers.
//!
//! The concrete implementation ([`ClaudeCliEngine`]) shells out to the
//! `claude` CLI; everything above this module treats the engine as an
//! opaque, long-running, possibly-failing capability.
//!
//! [`ClaudeCliEngine`]: claude_cli::ClaudeCliEngine

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod claude_cli;

pub use claude_cli::{ClaudeCliConfig, ClaudeCliEngine};

// ============================================================================
// Result Types
// ============================================================================

/// Terminal status of an agent execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Error,
    Timeout,
    BudgetExceeded,
}

impl ExecutionStatus {
    /// Get the wire-format string for this status
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Timeout => "timeout",
            Self::BudgetExceeded => "budget_exceeded",
        }
    }
}

/// Token usage for one execution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_creation_tokens: u64,
    #[serde(default)]
    pub cache_read_tokens: u64,
}

impl TokenUsage {
    /// Input plus output tokens (cache traffic excluded, matching how the
    /// provider reports totals).
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    /// Accumulate another usage into this one.
    pub fn add(&mut self, other: &TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cache_creation_tokens += other.cache_creation_tokens;
        self.cache_read_tokens += other.cache_read_tokens;
    }
}

/// Complete result of one agent execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,

    /// Final message text produced by the agent, if any
    pub result_text: Option<String>,

    /// Engine-assigned session identifier
    pub session_id: Option<String>,

    /// Wall-clock duration of the execution
    pub duration_ms: u64,

    /// Token usage reported by the engine
    pub usage: TokenUsage,

    /// Cost reported by the engine in USD; `0.0` with non-zero usage means
    /// the engine did not report a cost and it must be derived from usage
    pub cost_usd: f64,

    /// Number of conversation turns
    pub num_turns: u32,

    /// Error detail for non-success statuses
    pub error: Option<String>,
}

impl ExecutionResult {
    /// Whether the execution completed successfully.
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    /// Build a failure result with no usage data.
    pub fn failure(status: ExecutionStatus, error: impl Into<String>) -> Self {
        Self {
            status,
            result_text: None,
            session_id: None,
            duration_ms: 0,
            usage: TokenUsage::default(),
            cost_usd: 0.0,
            num_turns: 0,
            error: Some(error.into()),
        }
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Failures launching or reading the agent process.
///
/// Distinct from a run that executed and reported an error status: these
/// are infrastructure failures where no [`ExecutionResult`] came back.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The agent binary could not be found on PATH
    #[error("Agent binary not found: {binary}")]
    MissingBinary { binary: String },

    /// The agent process could not be spawned or awaited
    #[error("Failed to run agent process: {message}")]
    ProcessFailed { message: String },

    /// The agent process exited non-zero
    #[error("Agent process exited with code {exit_code}: {stderr}")]
    NonZeroExit { exit_code: i32, stderr: String },

    /// The agent's output could not be parsed as a result document
    #[error("Failed to parse agent output: {message}")]
    ParseFailure { message: String },
}

// ============================================================================
// Engine Trait
// ============================================================================

/// The agent execution capability.
///
/// Implementations run one prompt to completion and report the outcome. A
/// run that finished but failed (including timeout) is an `Ok` result with
/// the corresponding [`ExecutionStatus`]; `Err` is reserved for
/// infrastructure failures where the engine produced no result at all.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AgentEngine: Send + Sync {
    /// Run the agent once with the given prompt.
    async fn run(&self, prompt: &str) -> Result<ExecutionResult, EngineError>;
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
