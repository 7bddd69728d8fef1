//! [`AgentEngine`] implementation that shells out to the `claude` CLI.
//!
//! The CLI is invoked in non-interactive mode (`-p <prompt>`) with
//! `--output-format json`, which prints a single JSON result document on
//! stdout once the run completes. Timeouts are enforced here; a run that
//! exceeds the limit is killed and reported as
//! [`ExecutionStatus::Timeout`].

use super::{AgentEngine, EngineError, ExecutionResult, ExecutionStatus, TokenUsage};
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for [`ClaudeCliEngine`]
#[derive(Debug, Clone)]
pub struct ClaudeCliConfig {
    /// Binary name or path; resolved through PATH when not absolute
    pub binary: String,

    /// Model alias or full model ID passed to `--model`
    pub model: String,

    /// Optional cap on conversation turns
    pub max_turns: Option<u32>,

    /// Hard wall-clock limit for one run
    pub timeout: Duration,

    /// Working directory for the agent process
    pub working_dir: Option<PathBuf>,
}

impl Default for ClaudeCliConfig {
    fn default() -> Self {
        Self {
            binary: "claude".to_string(),
            model: "sonnet".to_string(),
            max_turns: None,
            timeout: Duration::from_secs(600),
            working_dir: None,
        }
    }
}

// ============================================================================
// ClaudeCliEngine
// ============================================================================

/// Runs prompts through the `claude` CLI as a subprocess.
pub struct ClaudeCliEngine {
    config: ClaudeCliConfig,
}

impl ClaudeCliEngine {
    /// Create an engine with the given configuration.
    pub fn new(config: ClaudeCliConfig) -> Self {
        Self { config }
    }
}

impl std::fmt::Debug for ClaudeCliEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaudeCliEngine")
            .field("binary", &self.config.binary)
            .field("model", &self.config.model)
            .field("timeout", &self.config.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AgentEngine for ClaudeCliEngine {
    /// Spawn the CLI, wait for completion (bounded by the configured
    /// timeout), and parse the JSON result document from stdout.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MissingBinary`] when the binary is not on
    /// PATH, [`EngineError::NonZeroExit`] for a failed process, and
    /// [`EngineError::ParseFailure`] when stdout is not a result document.
    /// A timed-out run is `Ok` with [`ExecutionStatus::Timeout`].
    #[instrument(skip(self, prompt), fields(model = %self.config.model))]
    async fn run(&self, prompt: &str) -> Result<ExecutionResult, EngineError> {
        let started = Instant::now();

        let mut command = tokio::process::Command::new(&self.config.binary);
        command
            .arg("-p")
            .arg(prompt)
            .arg("--output-format")
            .arg("json")
            .arg("--model")
            .arg(&self.config.model);

        if let Some(max_turns) = self.config.max_turns {
            command.arg("--max-turns").arg(max_turns.to_string());
        }

        if let Some(dir) = &self.config.working_dir {
            command.current_dir(dir);
        }

        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // If the timeout fires the child handle is dropped mid-run; the
            // process must not outlive it.
            .kill_on_drop(true);

        debug!(binary = %self.config.binary, "Spawning agent process");

        let child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EngineError::MissingBinary {
                    binary: self.config.binary.clone(),
                }
            } else {
                EngineError::ProcessFailed {
                    message: e.to_string(),
                }
            }
        })?;

        let output = match tokio::time::timeout(self.config.timeout, child.wait_with_output()).await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(EngineError::ProcessFailed {
                    message: e.to_string(),
                })
            }
            Err(_elapsed) => {
                let timeout_secs = self.config.timeout.as_secs();
                return Ok(ExecutionResult {
                    duration_ms: started.elapsed().as_millis() as u64,
                    ..ExecutionResult::failure(
                        ExecutionStatus::Timeout,
                        format!("agent run exceeded {timeout_secs}s timeout"),
                    )
                });
            }
        };

        let duration_ms = started.elapsed().as_millis() as u64;

        if !output.status.success() {
            return Err(EngineError::NonZeroExit {
                exit_code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_result_document(stdout.trim(), duration_ms)
    }
}

// ============================================================================
// Output parsing
// ============================================================================

/// Parse the CLI's `--output-format json` result document.
///
/// The document carries `is_error`, `result` (final message text),
/// `session_id`, `total_cost_usd`, `num_turns`, `duration_ms`, and a
/// `usage` object. The reported duration is preferred over the measured
/// one when present.
fn parse_result_document(stdout: &str, measured_ms: u64) -> Result<ExecutionResult, EngineError> {
    if stdout.is_empty() {
        return Err(EngineError::ParseFailure {
            message: "stdout was empty".to_string(),
        });
    }

    let doc: Value = serde_json::from_str(stdout).map_err(|e| EngineError::ParseFailure {
        message: format!("invalid result JSON: {e}"),
    })?;

    let is_error = doc.get("is_error").and_then(Value::as_bool).unwrap_or(false);
    let result_text = doc
        .get("result")
        .and_then(Value::as_str)
        .map(str::to_string);

    let usage = doc
        .get("usage")
        .map(|u| TokenUsage {
            input_tokens: u.get("input_tokens").and_then(Value::as_u64).unwrap_or(0),
            output_tokens: u.get("output_tokens").and_then(Value::as_u64).unwrap_or(0),
            cache_creation_tokens: u
                .get("cache_creation_input_tokens")
                .and_then(Value::as_u64)
                .unwrap_or(0),
            cache_read_tokens: u
                .get("cache_read_input_tokens")
                .and_then(Value::as_u64)
                .unwrap_or(0),
        })
        .unwrap_or_default();

    let status = if is_error {
        ExecutionStatus::Error
    } else {
        ExecutionStatus::Success
    };

    Ok(ExecutionResult {
        status,
        error: if is_error {
            Some(
                result_text
                    .clone()
                    .unwrap_or_else(|| "agent reported an error".to_string()),
            )
        } else {
            None
        },
        result_text,
        session_id: doc
            .get("session_id")
            .and_then(Value::as_str)
            .map(str::to_string),
        duration_ms: doc
            .get("duration_ms")
            .and_then(Value::as_u64)
            .unwrap_or(measured_ms),
        usage,
        cost_usd: doc
            .get("total_cost_usd")
            .and_then(Value::as_f64)
            .unwrap_or(0.0),
        num_turns: doc.get("num_turns").and_then(Value::as_u64).unwrap_or(0) as u32,
    })
}

#[cfg(test)]
#[path = "claude_cli_tests.rs"]
mod tests;
