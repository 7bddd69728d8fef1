//! The dispatcher: orchestrates validation, matching, rendering, and the
//! fire-and-forget execution handoff for one webhook delivery.
//!
//! The request path is fully synchronous up through prompt rendering and
//! returns a [`DispatchOutcome`] immediately; the agent execution itself is
//! spawned as a detached task with no return channel to the caller. The
//! spawned unit shares nothing mutable with the request path except the
//! immutable route-table snapshot it was born from.

use crate::runner::{BudgetGate, TaskRunner};
use crate::webhook::render::render_prompt;
use crate::webhook::routes::RouteTable;
use crate::webhook::validation::{check_timestamp, verify_signature, AuthError, WebhookSecret};
use crate::webhook::{EventEnvelope, WebhookHeaders};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tracing::{error, info, warn};

// ============================================================================
// Outcomes
// ============================================================================

/// Result of handling one webhook delivery, as seen by the HTTP layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A rule matched and an execution unit was spawned; the caller should
    /// acknowledge with 200 without waiting for the execution.
    Accepted { event_key: String },

    /// The delivery was valid but no route is configured for it. This is an
    /// expected outcome, acknowledged with 200.
    Ignored { reason: String },

    /// The delivery failed authentication or decoding and was not
    /// processed. Maps to 401/400.
    Rejected { reason: RejectReason },
}

/// Why a delivery was rejected before reaching the route table
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Invalid payload: {message}")]
    Decode { message: String },
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Orchestrates the webhook dispatch pipeline.
///
/// Owns the route table exclusively. The table is held behind
/// `RwLock<Arc<..>>` and replaced wholesale on [`reload_routes`]; request
/// handling clones the `Arc` once and works against that snapshot, so a
/// reload never exposes a partially-updated table.
///
/// [`reload_routes`]: Dispatcher::reload_routes
pub struct Dispatcher {
    secret: Option<WebhookSecret>,
    max_timestamp_age_seconds: u64,
    routes: RwLock<Arc<RouteTable>>,
    routes_file: Option<PathBuf>,
    runner: Arc<dyn TaskRunner>,
    budget: Arc<dyn BudgetGate>,
}

impl Dispatcher {
    /// Create a dispatcher.
    ///
    /// An empty `secret` is treated as unset: signature validation is
    /// skipped entirely and a warning is logged per delivery (explicit
    /// insecure mode, not a failure).
    pub fn new(
        secret: Option<WebhookSecret>,
        max_timestamp_age_seconds: u64,
        initial_routes: RouteTable,
        routes_file: Option<PathBuf>,
        runner: Arc<dyn TaskRunner>,
        budget: Arc<dyn BudgetGate>,
    ) -> Self {
        let secret = secret.filter(|s| !s.is_empty());

        Self {
            secret,
            max_timestamp_age_seconds,
            routes: RwLock::new(Arc::new(initial_routes)),
            routes_file,
            runner,
            budget,
        }
    }

    /// Handle one webhook delivery.
    ///
    /// Step order is strict: signature (raw bytes) → decode → timestamp →
    /// route lookup → render → budget-gated spawn. Returns as soon as the
    /// execution unit is spawned; its outcome is only ever logged.
    pub async fn handle_event(&self, raw_body: &[u8], headers: &WebhookHeaders) -> DispatchOutcome {
        // 1. Signature over the raw, unparsed body.
        match &self.secret {
            Some(secret) => {
                let Some(signature) = headers.signature.as_deref() else {
                    return DispatchOutcome::Rejected {
                        reason: AuthError::MissingSignatureHeader.into(),
                    };
                };
                if let Err(e) = verify_signature(secret, raw_body, signature) {
                    warn!(
                        delivery_id = headers.delivery_id.as_deref().unwrap_or("-"),
                        "Webhook signature validation failed"
                    );
                    return DispatchOutcome::Rejected { reason: e.into() };
                }
            }
            None => {
                warn!("Webhook secret not configured - skipping signature validation");
            }
        }

        // 2. Decode into the typed envelope.
        let envelope = match EventEnvelope::from_slice(raw_body) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "Failed to decode webhook payload");
                return DispatchOutcome::Rejected {
                    reason: RejectReason::Decode {
                        message: e.to_string(),
                    },
                };
            }
        };

        // 3. Replay window on the decoded timestamp.
        if let Err(e) = check_timestamp(envelope.webhook_timestamp, self.max_timestamp_age_seconds)
        {
            return DispatchOutcome::Rejected { reason: e.into() };
        }

        // 4. Route lookup against the current table snapshot.
        let event_key = envelope.event_key();
        info!(
            event_key = %event_key,
            delivery_id = headers.delivery_id.as_deref().unwrap_or("-"),
            "Processing webhook event"
        );

        let routes = self.routes_snapshot();
        let Some(rule) = routes.find_match(&event_key, &envelope) else {
            info!(event_key = %event_key, "No matching route rule for event");
            return DispatchOutcome::Ignored {
                reason: format!("no route configured for {event_key}"),
            };
        };

        // 5. Render the prompt from the matched rule.
        let prompt = render_prompt(&rule.prompt_template, &envelope);
        let task_description = rule
            .description
            .clone()
            .unwrap_or_else(|| event_key.clone());

        // 6. Detached execution unit. It re-checks the budget, invokes the
        // engine, and logs; nothing flows back to the HTTP caller.
        self.spawn_execution(prompt, event_key.clone(), task_description);

        DispatchOutcome::Accepted { event_key }
    }

    /// Spawn the fire-and-forget execution unit for a matched delivery.
    fn spawn_execution(&self, prompt: String, event_key: String, task_description: String) {
        let runner = Arc::clone(&self.runner);
        let budget = Arc::clone(&self.budget);

        tokio::spawn(async move {
            let status = budget.check_budget();
            if !status.within_budget {
                // Over budget: log and stop. No retry, no queueing.
                error!(
                    event_key = %event_key,
                    reason = %status.message,
                    "Skipping agent execution: budget exceeded"
                );
                return;
            }

            let result = runner.run_task(&prompt, &task_description).await;

            if result.is_success() {
                info!(
                    event_key = %event_key,
                    tokens = result.usage.total_tokens(),
                    cost_usd = result.cost_usd,
                    duration_ms = result.duration_ms,
                    "Agent completed successfully"
                );
            } else {
                error!(
                    event_key = %event_key,
                    status = ?result.status,
                    error = result.error.as_deref().unwrap_or("unknown"),
                    "Agent execution failed"
                );
            }
        });
    }

    /// The current route-table snapshot.
    pub fn routes_snapshot(&self) -> Arc<RouteTable> {
        self.routes
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Reload the route table from the configured routes file.
    ///
    /// The new table is built fully off to the side and then swapped in as
    /// a single reference replacement; a malformed file degrades to an
    /// empty table rather than keeping a half-applied state. Returns the
    /// number of rules now live.
    pub fn reload_routes(&self) -> usize {
        let table = match &self.routes_file {
            Some(path) => RouteTable::load_or_empty(path),
            None => {
                warn!("No routes file configured; reload produced an empty table");
                RouteTable::empty()
            }
        };

        self.replace_routes(table)
    }

    /// Replace the live route table wholesale. Returns the new rule count.
    pub fn replace_routes(&self, table: RouteTable) -> usize {
        let count = table.len();
        let mut guard = self
            .routes
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(table);
        count
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("secret", &self.secret)
            .field("max_timestamp_age_seconds", &self.max_timestamp_age_seconds)
            .field("routes_file", &self.routes_file)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
