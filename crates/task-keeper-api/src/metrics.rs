//! Metrics collection and observability types for the API service.

use prometheus::{Histogram, IntCounter};
use std::sync::Arc;

/// Service metrics for observability
#[derive(Debug)]
pub struct ServiceMetrics {
    // Webhook processing metrics
    pub webhook_requests_total: IntCounter,
    pub webhook_accepted_total: IntCounter,
    pub webhook_ignored_total: IntCounter,
    pub webhook_rejected_total: IntCounter,
    pub webhook_duration_seconds: Histogram,

    // Dispatch metrics
    pub executions_spawned_total: IntCounter,
    pub route_reloads_total: IntCounter,
}

impl ServiceMetrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        use prometheus::{register_histogram, register_int_counter};

        Ok(Arc::new(Self {
            webhook_requests_total: register_int_counter!(
                "webhook_requests_total",
                "Total webhook requests received"
            )?,
            webhook_accepted_total: register_int_counter!(
                "webhook_accepted_total",
                "Webhook deliveries that matched a rule and spawned an execution"
            )?,
            webhook_ignored_total: register_int_counter!(
                "webhook_ignored_total",
                "Valid webhook deliveries with no configured route"
            )?,
            webhook_rejected_total: register_int_counter!(
                "webhook_rejected_total",
                "Webhook deliveries rejected for auth or decode failures"
            )?,
            webhook_duration_seconds: register_histogram!(
                "webhook_duration_seconds",
                "Webhook request-path processing time (excludes agent execution)",
                vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0]
            )?,
            executions_spawned_total: register_int_counter!(
                "executions_spawned_total",
                "Detached agent execution units spawned"
            )?,
            route_reloads_total: register_int_counter!(
                "route_reloads_total",
                "Route table reload operations"
            )?,
        }))
    }
}
