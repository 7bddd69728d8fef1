//! # Task-Keeper HTTP Service
//!
//! HTTP server for receiving Linear webhooks and dispatching them to agent
//! executions through the Task-Keeper core.
//!
//! This service provides:
//! - Provider webhook endpoint with signature validation
//! - Health check endpoint
//! - Admin API for route-table inspection and hot reload
//! - Cost reporting and Prometheus metrics endpoints
//!
//! The webhook handler acknowledges deliveries immediately: validation,
//! routing, and rendering happen on the request path, while the agent
//! execution itself is spawned as a detached task inside the core
//! dispatcher and never blocks the response.

pub mod config;
pub mod errors;
pub mod metrics;
pub mod responses;

pub use config::{AgentConfig, LoggingConfig, ServerConfig, ServiceConfig, WebhookConfig};
pub use errors::{ConfigError, ServiceError, WebhookHandlerError};
pub use metrics::ServiceMetrics;
pub use responses::{
    HealthResponse, ReloadRoutesResponse, RouteRuleSummary, RoutesResponse, WebhookResponse,
};

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::Json,
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use prometheus::TextEncoder;
use std::{collections::HashMap, net::SocketAddr, sync::Arc};
use task_keeper_core::tracking::{CostReport, CostTracker};
use task_keeper_core::webhook::{DispatchOutcome, Dispatcher, WebhookHeaders};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{info, instrument};

/// The only webhook provider currently registered.
const LINEAR_PROVIDER: &str = "linear";

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: ServiceConfig,

    /// Core dispatcher handling validation, routing, and execution handoff
    pub dispatcher: Arc<Dispatcher>,

    /// Cost tracker for the reporting endpoint
    pub cost_tracker: Arc<CostTracker>,

    /// Metrics collector for observability
    pub metrics: Arc<ServiceMetrics>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        config: ServiceConfig,
        dispatcher: Arc<Dispatcher>,
        cost_tracker: Arc<CostTracker>,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            config,
            dispatcher,
            cost_tracker,
            metrics,
        }
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let webhook_routes =
        Router::new().route("/webhooks/{provider}", post(handle_webhook));

    let health_routes = Router::new().route("/health", get(handle_health_check));

    let api_routes = Router::new().route("/api/costs", get(get_cost_report));

    let observability_routes = Router::new().route("/metrics", get(metrics_endpoint));

    let admin_routes = Router::new()
        .route("/admin/routes", get(list_routes))
        .route("/admin/routes/reload", post(reload_routes));

    let router = Router::new()
        .merge(webhook_routes)
        .merge(health_routes)
        .merge(api_routes)
        .merge(observability_routes)
        .merge(admin_routes);

    let router = if state.config.server.enable_compression {
        router.layer(CompressionLayer::new())
    } else {
        router
    };

    let router = if state.config.server.enable_cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    };

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Start HTTP server with graceful shutdown
pub async fn start_server(
    config: ServiceConfig,
    dispatcher: Arc<Dispatcher>,
    cost_tracker: Arc<CostTracker>,
) -> Result<(), ServiceError> {
    let metrics = ServiceMetrics::new().map_err(|e| {
        ServiceError::Configuration(ConfigError::Invalid {
            message: format!("Failed to initialize metrics: {}", e),
        })
    })?;

    let host: std::net::IpAddr = config.server.host.parse().map_err(|_| {
        ServiceError::Configuration(ConfigError::Invalid {
            message: format!("Invalid server.host: {}", config.server.host),
        })
    })?;
    let addr = SocketAddr::from((host, config.server.port));

    let state = AppState::new(config, dispatcher, cost_tracker, metrics);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ServiceError::BindFailed {
            address: addr.to_string(),
            message: e.to_string(),
        })?;

    info!("Starting HTTP server on {}", addr);

    let shutdown_signal = async move {
        let ctrl_c = async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C signal handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
            },
            _ = terminate => {
                info!("Received SIGTERM, initiating graceful shutdown");
            },
        }
    };

    // In-flight requests complete before the server stops; detached
    // execution units are not joined (they outlive their request by design).
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .map_err(|e| ServiceError::ServerFailed {
            message: e.to_string(),
        })?;

    info!("HTTP server shutdown complete");
    Ok(())
}

// ============================================================================
// Webhook Handlers
// ============================================================================

/// Handle provider webhook requests
///
/// The immediate-response pattern: signature validation, payload decode,
/// route matching, and prompt rendering happen here; the agent execution is
/// spawned by the dispatcher and the response returns without waiting for
/// it. The provider only ever sees transport-level codes.
#[instrument(skip(state, headers, body), fields(provider = %provider))]
pub async fn handle_webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, WebhookHandlerError> {
    state.metrics.webhook_requests_total.inc();
    let timer = state.metrics.webhook_duration_seconds.start_timer();

    if provider != LINEAR_PROVIDER {
        return Err(WebhookHandlerError::ProviderNotFound { provider });
    }

    // Convert headers to a plain map for the core layer
    let header_map: HashMap<String, String> = headers
        .iter()
        .map(|(k, v)| {
            (
                k.as_str().to_lowercase(),
                v.to_str().unwrap_or("").to_string(),
            )
        })
        .collect();

    let webhook_headers = WebhookHeaders::from_http_headers(&header_map);

    let outcome = state
        .dispatcher
        .handle_event(&body, &webhook_headers)
        .await;

    timer.observe_duration();

    match outcome {
        DispatchOutcome::Accepted { event_key } => {
            state.metrics.webhook_accepted_total.inc();
            state.metrics.executions_spawned_total.inc();
            info!(event_key = %event_key, "Webhook accepted - agent execution spawned");
            Ok(Json(WebhookResponse::accepted(event_key)))
        }
        DispatchOutcome::Ignored { reason } => {
            state.metrics.webhook_ignored_total.inc();
            Ok(Json(WebhookResponse::ignored(reason)))
        }
        DispatchOutcome::Rejected { reason } => {
            state.metrics.webhook_rejected_total.inc();
            Err(WebhookHandlerError::Rejected(reason))
        }
    }
}

// ============================================================================
// Health Check Handlers
// ============================================================================

/// Basic health check endpoint
#[instrument(skip_all)]
async fn handle_health_check(State(_state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// API Handlers
// ============================================================================

/// Cost report endpoint
#[instrument(skip_all)]
async fn get_cost_report(State(state): State<AppState>) -> Json<CostReport> {
    Json(state.cost_tracker.report())
}

// ============================================================================
// Observability Handlers
// ============================================================================

/// Prometheus metrics endpoint
#[instrument(skip_all)]
async fn metrics_endpoint(
    State(_state): State<AppState>,
) -> Result<String, axum::http::StatusCode> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    encoder
        .encode_to_string(&metric_families)
        .map_err(|_| axum::http::StatusCode::INTERNAL_SERVER_ERROR)
}

// ============================================================================
// Admin Handlers
// ============================================================================

/// List the currently-live route rules
#[instrument(skip_all)]
async fn list_routes(State(state): State<AppState>) -> Json<RoutesResponse> {
    let table = state.dispatcher.routes_snapshot();

    let rules = table
        .rules()
        .iter()
        .map(|rule| RouteRuleSummary {
            event_pattern: rule.event_pattern.clone(),
            enabled: rule.enabled,
            conditions: rule.conditions.len(),
            description: rule.description.clone(),
        })
        .collect();

    Json(RoutesResponse { rules })
}

/// Reload the route table from the configured routes file
///
/// The table is rebuilt off to the side and swapped atomically; in-flight
/// requests keep the snapshot they started with.
#[instrument(skip_all)]
async fn reload_routes(State(state): State<AppState>) -> Json<ReloadRoutesResponse> {
    let rules_loaded = state.dispatcher.reload_routes();
    state.metrics.route_reloads_total.inc();

    info!(rules = rules_loaded, "Route table reloaded");

    Json(ReloadRoutesResponse {
        status: "reloaded".to_string(),
        rules_loaded,
    })
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
