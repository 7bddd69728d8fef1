//! # Agent Runner Module
//!
//! High-level execution lifecycle: the [`TaskRunner`] and [`BudgetGate`]
//! capability traits consumed by the dispatcher, and [`AgentRunner`], the
//! composition of engine, cost tracker, and notifier that implements them.
//!
//! The runner also carries the interval service mode: run the configured
//! prompt repeatedly until shutdown is requested.

use crate::engine::{AgentEngine, ExecutionResult, ExecutionStatus};
use crate::notify::Notifier;
use crate::tracking::CostTracker;
use crate::RunId;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

// ============================================================================
// Capability Traits
// ============================================================================

/// Outcome of a budget check
#[derive(Debug, Clone)]
pub struct BudgetStatus {
    pub within_budget: bool,
    pub message: String,
}

/// The cost-ledger capability: answers "may another run start?".
///
/// Implementations serialize their own updates; callers treat this as an
/// opaque check.
pub trait BudgetGate: Send + Sync {
    fn check_budget(&self) -> BudgetStatus;
}

/// The task-execution capability consumed by the dispatcher.
///
/// A run that fails is still a normal return — failures are encoded in the
/// [`ExecutionResult`] status and are the caller's to log, not to propagate.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run_task(&self, prompt: &str, task_description: &str) -> ExecutionResult;
}

// ============================================================================
// AgentRunner
// ============================================================================

/// Full-lifecycle agent runner: budget check, engine execution, cost
/// tracking, and notification for every run.
pub struct AgentRunner {
    engine: Arc<dyn AgentEngine>,
    cost_tracker: Arc<CostTracker>,
    notifier: Option<Arc<dyn Notifier>>,
    model: String,
}

impl AgentRunner {
    /// Create a runner.
    ///
    /// `model` is the pricing key used when the engine reports no cost.
    pub fn new(
        engine: Arc<dyn AgentEngine>,
        cost_tracker: Arc<CostTracker>,
        notifier: Option<Arc<dyn Notifier>>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            cost_tracker,
            notifier,
            model: model.into(),
        }
    }

    /// Run the agent once.
    ///
    /// Checks the budget first; an over-budget run is short-circuited into
    /// a [`ExecutionStatus::BudgetExceeded`] result without touching the
    /// engine. Engine infrastructure failures are folded into an error
    /// result rather than propagated.
    #[instrument(skip(self, prompt), fields(run_id = %RunId::new()))]
    pub async fn run_once(&self, prompt: &str, task_description: &str) -> ExecutionResult {
        let budget = self.cost_tracker.check_budget();
        if !budget.within_budget {
            error!(reason = %budget.message, "Refusing to run agent: budget exceeded");
            let result =
                ExecutionResult::failure(ExecutionStatus::BudgetExceeded, budget.message);
            self.handle_result(&result, task_description).await;
            return result;
        }

        info!(task = %task_description, "Starting agent run");

        let result = match self.engine.run(prompt).await {
            Ok(result) => result,
            Err(e) => ExecutionResult::failure(ExecutionStatus::Error, e.to_string()),
        };

        self.cost_tracker
            .track_result(&result, &self.model, task_description);

        self.handle_result(&result, task_description).await;

        result
    }

    /// Log and notify for a completed run.
    async fn handle_result(&self, result: &ExecutionResult, task_description: &str) {
        if result.is_success() {
            info!(
                tokens = result.usage.total_tokens(),
                cost_usd = result.cost_usd,
                num_turns = result.num_turns,
                "Agent run completed"
            );
        } else {
            error!(
                status = result.status.as_str(),
                error = result.error.as_deref().unwrap_or("unknown"),
                "Agent run failed"
            );
        }

        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.notify_result(result, task_description).await {
                warn!(error = %e, "Failed to send result notification");
            }
        }
    }

    /// Run the agent as a service: execute `prompt` every `interval` until
    /// shutdown is signalled.
    ///
    /// Failed runs are logged and the loop continues; there is no retry
    /// semantics beyond the next scheduled run.
    pub async fn run_service(
        &self,
        prompt: &str,
        task_description: &str,
        interval: Duration,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) {
        info!(interval_seconds = interval.as_secs(), "Starting service mode");

        let mut run_count: u64 = 0;
        loop {
            run_count += 1;
            info!(run = run_count, "Service run starting");

            let result = self.run_once(prompt, task_description).await;
            if !result.is_success() {
                warn!(
                    run = run_count,
                    status = result.status.as_str(),
                    "Service run failed"
                );
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Service mode stopped");
    }
}

#[async_trait]
impl TaskRunner for AgentRunner {
    async fn run_task(&self, prompt: &str, task_description: &str) -> ExecutionResult {
        self.run_once(prompt, task_description).await
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
