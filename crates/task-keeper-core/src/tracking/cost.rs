//! Cost tracking and budget management.
//!
//! Tracks the cost of every agent execution in an in-memory summary with an
//! optional JSON ledger on disk, and answers budget checks for the
//! dispatcher's [`BudgetGate`] capability.
//!
//! [`BudgetGate`]: crate::runner::BudgetGate

use crate::engine::{ExecutionResult, TokenUsage};
use crate::runner::{BudgetGate, BudgetStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, warn};

// ============================================================================
// Pricing
// ============================================================================

/// Pricing for one model, in USD per million tokens
#[derive(Debug, Clone, Copy)]
pub struct ModelPricing {
    pub input: f64,
    pub output: f64,
    pub cache_write: f64,
    pub cache_read: f64,
}

const SONNET_PRICING: ModelPricing = ModelPricing {
    input: 3.0,
    output: 15.0,
    cache_write: 3.75,
    cache_read: 0.30,
};

const OPUS_PRICING: ModelPricing = ModelPricing {
    input: 15.0,
    output: 75.0,
    cache_write: 18.75,
    cache_read: 1.50,
};

const HAIKU_PRICING: ModelPricing = ModelPricing {
    input: 0.25,
    output: 1.25,
    cache_write: 0.30,
    cache_read: 0.03,
};

/// Resolve pricing for a model name; unrecognized names price as sonnet.
fn pricing_for(model: &str) -> ModelPricing {
    let model = model.to_ascii_lowercase();
    if model.contains("opus") {
        OPUS_PRICING
    } else if model.contains("haiku") {
        HAIKU_PRICING
    } else {
        SONNET_PRICING
    }
}

// ============================================================================
// Ledger Types
// ============================================================================

/// A single cost entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostEntry {
    pub timestamp: DateTime<Utc>,
    pub session_id: Option<String>,
    pub model: String,
    pub usage: TokenUsage,
    pub cost_usd: f64,
    #[serde(default)]
    pub task_description: String,
}

/// Cumulative cost summary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostSummary {
    pub total_cost_usd: f64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_cache_creation_tokens: u64,
    pub total_cache_read_tokens: u64,
    pub num_sessions: u64,
    #[serde(default)]
    pub entries: Vec<CostEntry>,
}

impl CostSummary {
    /// Input plus output tokens across all entries.
    pub fn total_tokens(&self) -> u64 {
        self.total_input_tokens + self.total_output_tokens
    }

    /// Fold one entry into the summary.
    pub fn add_entry(&mut self, entry: CostEntry) {
        self.total_cost_usd += entry.cost_usd;
        self.total_input_tokens += entry.usage.input_tokens;
        self.total_output_tokens += entry.usage.output_tokens;
        self.total_cache_creation_tokens += entry.usage.cache_creation_tokens;
        self.total_cache_read_tokens += entry.usage.cache_read_tokens;
        self.num_sessions += 1;
        self.entries.push(entry);
    }
}

/// Snapshot report for operators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostReport {
    pub total_cost_usd: f64,
    pub total_sessions: u64,
    pub total_tokens: u64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_cache_creation_tokens: u64,
    pub total_cache_read_tokens: u64,
    pub budget_limit_usd: Option<f64>,
    pub remaining_budget_usd: Option<f64>,
    pub average_cost_per_session: f64,
    pub recent_entries: Vec<RecentEntry>,
}

/// Abbreviated entry for the report's recent-runs list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentEntry {
    pub timestamp: DateTime<Utc>,
    pub session_id: Option<String>,
    pub cost_usd: f64,
    pub tokens: u64,
}

// ============================================================================
// CostTracker
// ============================================================================

/// Tracks costs across agent executions with budget enforcement.
///
/// Updates are serialized behind an internal mutex; the tracker is shared
/// freely between the dispatcher's execution units.
pub struct CostTracker {
    storage_path: Option<PathBuf>,
    budget_limit_usd: Option<f64>,
    alert_threshold_pct: f64,
    summary: Mutex<CostSummary>,
}

/// On-disk ledger format
#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerFile {
    #[serde(default)]
    total_cost_usd: f64,
    #[serde(default)]
    entries: Vec<CostEntry>,
}

impl CostTracker {
    /// Create a tracker, loading any existing ledger from `storage_path`.
    ///
    /// A corrupt ledger file starts the tracker fresh with a warning rather
    /// than failing construction.
    pub fn new(storage_path: Option<PathBuf>, budget_limit_usd: Option<f64>) -> Self {
        let mut summary = CostSummary::default();

        if let Some(path) = &storage_path {
            match std::fs::read_to_string(path) {
                Ok(contents) => match serde_json::from_str::<LedgerFile>(&contents) {
                    Ok(ledger) => {
                        for entry in ledger.entries {
                            summary.add_entry(entry);
                        }
                        debug!(
                            path = %path.display(),
                            entries = summary.num_sessions,
                            "Loaded cost ledger"
                        );
                    }
                    Err(e) => {
                        warn!(
                            path = %path.display(),
                            error = %e,
                            "Cost ledger is corrupt; starting fresh"
                        );
                    }
                },
                // A missing ledger is the normal first-run state.
                Err(_) => {}
            }
        }

        Self {
            storage_path,
            budget_limit_usd,
            alert_threshold_pct: 80.0,
            summary: Mutex::new(summary),
        }
    }

    /// Override the budget alert threshold (percentage of the limit).
    pub fn with_alert_threshold(mut self, pct: f64) -> Self {
        self.alert_threshold_pct = pct;
        self
    }

    /// Calculate cost from token usage for a model.
    pub fn calculate_cost(usage: &TokenUsage, model: &str) -> f64 {
        let pricing = pricing_for(model);

        (usage.input_tokens as f64 / 1_000_000.0) * pricing.input
            + (usage.output_tokens as f64 / 1_000_000.0) * pricing.output
            + (usage.cache_creation_tokens as f64 / 1_000_000.0) * pricing.cache_write
            + (usage.cache_read_tokens as f64 / 1_000_000.0) * pricing.cache_read
    }

    /// Record the cost of one execution result.
    ///
    /// The engine's reported cost is trusted when non-zero. A reported cost
    /// of exactly `0.0` with non-zero token usage means the engine omitted
    /// the figure, so it is recomputed from the pricing table; zero usage
    /// stays at zero (a genuinely free run).
    pub fn track_result(
        &self,
        result: &ExecutionResult,
        model: &str,
        task_description: &str,
    ) -> CostEntry {
        let cost = if result.cost_usd == 0.0 && result.usage.total_tokens() > 0 {
            Self::calculate_cost(&result.usage, model)
        } else {
            result.cost_usd
        };

        let entry = CostEntry {
            timestamp: Utc::now(),
            session_id: result.session_id.clone(),
            model: model.to_string(),
            usage: result.usage,
            cost_usd: cost,
            task_description: task_description.to_string(),
        };

        let mut summary = self.lock_summary();
        summary.add_entry(entry.clone());
        self.save(&summary);

        entry
    }

    /// Check whether the budget allows another run.
    pub fn check_budget(&self) -> BudgetStatus {
        let Some(limit) = self.budget_limit_usd else {
            return BudgetStatus {
                within_budget: true,
                message: "No budget limit set".to_string(),
            };
        };

        let current = self.lock_summary().total_cost_usd;
        let pct_used = if limit > 0.0 {
            (current / limit) * 100.0
        } else {
            0.0
        };

        if current >= limit {
            return BudgetStatus {
                within_budget: false,
                message: format!(
                    "Budget exceeded: ${current:.4} / ${limit:.2} ({pct_used:.1}%)"
                ),
            };
        }

        if pct_used >= self.alert_threshold_pct {
            return BudgetStatus {
                within_budget: true,
                message: format!(
                    "Budget alert: ${current:.4} / ${limit:.2} ({pct_used:.1}%)"
                ),
            };
        }

        BudgetStatus {
            within_budget: true,
            message: format!("Budget OK: ${current:.4} / ${limit:.2} ({pct_used:.1}%)"),
        }
    }

    /// Remaining budget in USD, when a limit is set.
    pub fn remaining_budget(&self) -> Option<f64> {
        let limit = self.budget_limit_usd?;
        let current = self.lock_summary().total_cost_usd;
        Some((limit - current).max(0.0))
    }

    /// Generate a snapshot report.
    pub fn report(&self) -> CostReport {
        let summary = self.lock_summary();

        let average = if summary.num_sessions > 0 {
            summary.total_cost_usd / summary.num_sessions as f64
        } else {
            0.0
        };

        let recent_entries = summary
            .entries
            .iter()
            .rev()
            .take(10)
            .rev()
            .map(|e| RecentEntry {
                timestamp: e.timestamp,
                session_id: e.session_id.clone(),
                cost_usd: e.cost_usd,
                tokens: e.usage.total_tokens(),
            })
            .collect();

        CostReport {
            total_cost_usd: summary.total_cost_usd,
            total_sessions: summary.num_sessions,
            total_tokens: summary.total_tokens(),
            total_input_tokens: summary.total_input_tokens,
            total_output_tokens: summary.total_output_tokens,
            total_cache_creation_tokens: summary.total_cache_creation_tokens,
            total_cache_read_tokens: summary.total_cache_read_tokens,
            budget_limit_usd: self.budget_limit_usd,
            remaining_budget_usd: self
                .budget_limit_usd
                .map(|limit| (limit - summary.total_cost_usd).max(0.0)),
            average_cost_per_session: average,
            recent_entries,
        }
    }

    /// Reset all cost tracking and delete the ledger file.
    pub fn reset(&self) {
        let mut summary = self.lock_summary();
        *summary = CostSummary::default();

        if let Some(path) = &self.storage_path {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(path) {
                    warn!(path = %path.display(), error = %e, "Failed to remove cost ledger");
                }
            }
        }
    }

    fn lock_summary(&self) -> std::sync::MutexGuard<'_, CostSummary> {
        self.summary
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Persist the ledger; persistence failures degrade to a warning.
    fn save(&self, summary: &CostSummary) {
        let Some(path) = &self.storage_path else {
            return;
        };

        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(path = %path.display(), error = %e, "Failed to create ledger directory");
                return;
            }
        }

        let ledger = LedgerFile {
            total_cost_usd: summary.total_cost_usd,
            entries: summary.entries.clone(),
        };

        match serde_json::to_string_pretty(&ledger) {
            Ok(json) => {
                if let Err(e) = std::fs::write(path, json) {
                    warn!(path = %path.display(), error = %e, "Failed to write cost ledger");
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to serialize cost ledger");
            }
        }
    }
}

impl BudgetGate for CostTracker {
    fn check_budget(&self) -> BudgetStatus {
        CostTracker::check_budget(self)
    }
}

impl std::fmt::Debug for CostTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CostTracker")
            .field("storage_path", &self.storage_path)
            .field("budget_limit_usd", &self.budget_limit_usd)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "cost_tests.rs"]
mod tests;
