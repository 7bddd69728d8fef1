//! # Task-Keeper Service
//!
//! Binary entry point for the Task-Keeper HTTP service.
//!
//! This executable:
//! - Loads configuration from environment and files
//! - Initializes observability (logging, metrics)
//! - Creates the dispatcher, agent engine, cost tracker, and notifier
//! - Starts the HTTP server from task-keeper-api

use std::sync::Arc;
use std::time::Duration;
use task_keeper_api::{start_server, ServiceConfig, ServiceError};
use task_keeper_core::engine::{ClaudeCliConfig, ClaudeCliEngine};
use task_keeper_core::notify::{Notifier, SlackNotifier};
use task_keeper_core::runner::AgentRunner;
use task_keeper_core::tracking::CostTracker;
use task_keeper_core::webhook::{Dispatcher, RouteTable, WebhookSecret};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "task_keeper_service=info,task_keeper_api=info,task_keeper_core=info,tower_http=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Task-Keeper Service");

    // -------------------------------------------------------------------------
    // Load configuration
    //
    // Sources (applied in order — later sources override earlier ones):
    //  1. /etc/task-keeper/service.yaml    — system-wide defaults
    //  2. ./config/service.yaml            — deployment-local override
    //  3. Path given by TK_CONFIG_FILE env — operator-specified file
    //  4. Environment variables prefixed TK__ (double-underscore separator)
    //     e.g. TK__SERVER__PORT=9090 sets server.port = 9090
    //
    // All service configuration fields carry serde defaults, so absent files
    // or an entirely unconfigured environment produces a valid service config
    // with built-in defaults.  A malformed file or an environment variable
    // that cannot be coerced to the correct type IS a hard error because it
    // indicates deliberate-but-broken operator configuration.
    // -------------------------------------------------------------------------
    let mut config_builder = config::Config::builder()
        .add_source(
            config::File::with_name("/etc/task-keeper/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        )
        .add_source(
            config::File::with_name("config/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        );

    // Optional explicit path supplied by the operator.
    if let Ok(explicit_path) = std::env::var("TK_CONFIG_FILE") {
        if !explicit_path.is_empty() {
            config_builder = config_builder.add_source(
                config::File::with_name(&explicit_path)
                    .required(true)
                    .format(config::FileFormat::Yaml),
            );
            info!(path = %explicit_path, "Loading configuration from explicit path");
        }
    }

    let config = match config_builder
        .add_source(config::Environment::with_prefix("TK").separator("__"))
        .build()
    {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "Failed to build configuration; aborting");
            std::process::exit(3);
        }
    };

    let service_config: ServiceConfig = match config.try_deserialize() {
        Ok(sc) => sc,
        Err(e) => {
            error!(
                error = %e,
                "Could not deserialize service configuration; aborting. \
                 Fix the configuration and restart."
            );
            std::process::exit(3);
        }
    };

    if let Err(e) = service_config.validate() {
        error!(error = %e, "Service configuration is invalid; aborting");
        std::process::exit(3);
    }

    // -------------------------------------------------------------------------
    // Wire components
    //
    // The dispatcher owns the route table; the runner composes the engine
    // with cost tracking and notification. The cost tracker doubles as the
    // dispatcher's budget gate.
    // -------------------------------------------------------------------------
    let engine = Arc::new(ClaudeCliEngine::new(ClaudeCliConfig {
        binary: service_config.agent.binary.clone(),
        model: service_config.agent.model.clone(),
        max_turns: service_config.agent.max_turns,
        timeout: Duration::from_secs(service_config.agent.timeout_seconds),
        working_dir: service_config.agent.working_dir.clone(),
    }));

    let cost_tracker = Arc::new(CostTracker::new(
        service_config.agent.cost_ledger.clone(),
        service_config.agent.max_budget_usd,
    ));

    let notifier: Option<Arc<dyn Notifier>> = {
        let slack = SlackNotifier::new(service_config.slack.clone());
        if slack.is_enabled() {
            info!("Slack notifications enabled");
            Some(Arc::new(slack))
        } else {
            None
        }
    };

    let runner = Arc::new(AgentRunner::new(
        engine,
        Arc::clone(&cost_tracker),
        notifier,
        service_config.agent.model.clone(),
    ));

    let initial_routes = match &service_config.webhook.routes_file {
        Some(path) => RouteTable::load_or_empty(path),
        None => {
            info!("No routes file configured; starting with an empty route table");
            RouteTable::empty()
        }
    };

    let secret = service_config
        .webhook
        .secret
        .as_deref()
        .map(WebhookSecret::new);

    let dispatcher = Arc::new(Dispatcher::new(
        secret,
        service_config.webhook.max_timestamp_age_seconds,
        initial_routes,
        service_config.webhook.routes_file.clone(),
        runner,
        Arc::clone(&cost_tracker) as Arc<dyn task_keeper_core::runner::BudgetGate>,
    ));

    info!(
        host = %service_config.server.host,
        port = service_config.server.port,
        "Starting HTTP server"
    );

    // Start the server
    if let Err(e) = start_server(service_config, dispatcher, cost_tracker).await {
        error!("Failed to start server: {}", e);

        let exit_code = match e {
            ServiceError::BindFailed { .. } => 1,
            ServiceError::ServerFailed { .. } => 2,
            ServiceError::Configuration(_) => 3,
        };

        std::process::exit(exit_code);
    }

    Ok(())
}
