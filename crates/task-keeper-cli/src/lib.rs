//! # Task-Keeper CLI
//!
//! Command-line interface for the Task-Keeper dispatch system.
//!
//! This module provides CLI commands for:
//! - Starting the webhook server (`serve`)
//! - Running a one-off agent task (`run`)
//! - Validating and scaffolding route files (`routes`)
//! - Inspecting and resetting the cost ledger (`cost`)

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use task_keeper_api::{ServiceConfig, ServiceError};
use task_keeper_core::engine::{ClaudeCliConfig, ClaudeCliEngine};
use task_keeper_core::notify::{Notifier, SlackNotifier};
use task_keeper_core::runner::AgentRunner;
use task_keeper_core::tracking::CostTracker;
use task_keeper_core::webhook::{default_routes, Dispatcher, RouteTable, WebhookSecret};
use tracing::info;

// ============================================================================
// CLI Structure
// ============================================================================

/// Task-Keeper CLI - webhook-triggered agent dispatch
#[derive(Parser)]
#[command(name = "task-keeper")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Trigger budget-gated agent runs from webhooks and schedules")]
#[command(
    long_about = "Task-Keeper receives provider webhooks, routes them through \
                  user-defined rules, and dispatches fire-and-forget agent executions"
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "TASK_KEEPER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Logging level
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    pub json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the webhook server
    Serve {
        /// Host to bind HTTP server
        #[arg(long)]
        host: Option<String>,

        /// Port to bind HTTP server
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run the agent once with a prompt
    Run {
        /// Task prompt (mutually exclusive with --prompt-file)
        prompt: Option<String>,

        /// Read the prompt from a file
        #[arg(long, conflicts_with = "prompt")]
        prompt_file: Option<PathBuf>,

        /// Description used in logs and notifications
        #[arg(short, long, default_value = "")]
        description: String,

        /// Repeat the run every N seconds until interrupted
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Route file management
    Routes {
        #[command(subcommand)]
        action: RouteCommands,
    },

    /// Cost ledger commands
    Cost {
        #[command(subcommand)]
        action: CostCommands,
    },
}

/// Route file subcommands
#[derive(Subcommand)]
pub enum RouteCommands {
    /// Validate a route file and print a summary
    Validate {
        /// Route file to validate (defaults to the configured routes file)
        file: Option<PathBuf>,
    },

    /// Write a starter route file with default rules
    Init {
        /// Destination path
        file: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Cost ledger subcommands
#[derive(Subcommand)]
pub enum CostCommands {
    /// Print the cost report
    Report {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Clear the cost ledger
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

// ============================================================================
// CLI Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Command failed: {message}")]
    CommandFailed { message: String },

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Main CLI entry point
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();

    initialize_logging(&cli);

    let config = load_configuration(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { host, port } => execute_serve_command(host, port, config).await,
        Commands::Run {
            prompt,
            prompt_file,
            description,
            interval,
        } => execute_run_command(prompt, prompt_file, description, interval, config).await,
        Commands::Routes { action } => execute_routes_command(action, &config),
        Commands::Cost { action } => execute_cost_command(action, &config),
    }
}

/// Initialize logging based on CLI arguments
fn initialize_logging(cli: &Cli) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.log_level.clone().into());

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Load service configuration with the same layering as the service binary:
/// optional explicit file, then `TK__`-prefixed environment variables.
fn load_configuration(config_path: Option<&std::path::Path>) -> Result<ServiceConfig, CliError> {
    let mut builder = config::Config::builder();

    if let Some(path) = config_path {
        builder = builder.add_source(
            config::File::from(path)
                .required(true)
                .format(config::FileFormat::Yaml),
        );
    } else {
        builder = builder.add_source(
            config::File::with_name("config/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        );
    }

    let config = builder
        .add_source(config::Environment::with_prefix("TK").separator("__"))
        .build()
        .map_err(|e| CliError::Configuration {
            message: e.to_string(),
        })?;

    let service_config: ServiceConfig =
        config
            .try_deserialize()
            .map_err(|e| CliError::Configuration {
                message: e.to_string(),
            })?;

    service_config
        .validate()
        .map_err(|e| CliError::Configuration {
            message: e.to_string(),
        })?;

    Ok(service_config)
}

// ============================================================================
// Component wiring
// ============================================================================

/// Build the runner stack (engine + cost tracker + notifier) from config.
fn build_runner(config: &ServiceConfig) -> (Arc<AgentRunner>, Arc<CostTracker>) {
    let engine = Arc::new(ClaudeCliEngine::new(ClaudeCliConfig {
        binary: config.agent.binary.clone(),
        model: config.agent.model.clone(),
        max_turns: config.agent.max_turns,
        timeout: Duration::from_secs(config.agent.timeout_seconds),
        working_dir: config.agent.working_dir.clone(),
    }));

    let cost_tracker = Arc::new(CostTracker::new(
        config.agent.cost_ledger.clone(),
        config.agent.max_budget_usd,
    ));

    let notifier: Option<Arc<dyn Notifier>> = {
        let slack = SlackNotifier::new(config.slack.clone());
        slack
            .is_enabled()
            .then(|| Arc::new(slack) as Arc<dyn Notifier>)
    };

    let runner = Arc::new(AgentRunner::new(
        engine,
        Arc::clone(&cost_tracker),
        notifier,
        config.agent.model.clone(),
    ));

    (runner, cost_tracker)
}

// ============================================================================
// Command Implementations
// ============================================================================

/// Execute serve command
async fn execute_serve_command(
    host: Option<String>,
    port: Option<u16>,
    mut config: ServiceConfig,
) -> Result<(), CliError> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let (runner, cost_tracker) = build_runner(&config);

    let initial_routes = match &config.webhook.routes_file {
        Some(path) => RouteTable::load_or_empty(path),
        None => RouteTable::empty(),
    };

    let secret = config.webhook.secret.as_deref().map(WebhookSecret::new);

    let dispatcher = Arc::new(Dispatcher::new(
        secret,
        config.webhook.max_timestamp_age_seconds,
        initial_routes,
        config.webhook.routes_file.clone(),
        runner,
        Arc::clone(&cost_tracker) as Arc<dyn task_keeper_core::runner::BudgetGate>,
    ));

    task_keeper_api::start_server(config, dispatcher, cost_tracker).await?;

    Ok(())
}

/// Execute run command
async fn execute_run_command(
    prompt: Option<String>,
    prompt_file: Option<PathBuf>,
    description: String,
    interval: Option<u64>,
    config: ServiceConfig,
) -> Result<(), CliError> {
    let prompt = match (prompt, prompt_file) {
        (Some(prompt), None) => prompt,
        (None, Some(path)) => std::fs::read_to_string(&path)?,
        (None, None) => {
            return Err(CliError::InvalidArgument {
                arg: "prompt".to_string(),
                message: "provide a prompt argument or --prompt-file".to_string(),
            })
        }
        // clap's conflicts_with rules this out
        (Some(_), Some(_)) => unreachable!("prompt and --prompt-file are mutually exclusive"),
    };

    let description = if description.is_empty() {
        prompt.chars().take(100).collect()
    } else {
        description
    };

    let (runner, _cost_tracker) = build_runner(&config);

    match interval {
        Some(seconds) => {
            let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Shutdown requested");
                    let _ = shutdown_tx.send(true);
                }
            });

            runner
                .run_service(
                    &prompt,
                    &description,
                    Duration::from_secs(seconds),
                    shutdown_rx,
                )
                .await;
            Ok(())
        }
        None => {
            let result = runner.run_once(&prompt, &description).await;

            if let Some(text) = &result.result_text {
                println!("{text}");
            }

            if result.is_success() {
                Ok(())
            } else {
                Err(CliError::CommandFailed {
                    message: result
                        .error
                        .unwrap_or_else(|| "agent run failed".to_string()),
                })
            }
        }
    }
}

/// Execute routes command
fn execute_routes_command(action: RouteCommands, config: &ServiceConfig) -> Result<(), CliError> {
    match action {
        RouteCommands::Validate { file } => {
            let path = file
                .or_else(|| config.webhook.routes_file.clone())
                .ok_or_else(|| CliError::InvalidArgument {
                    arg: "file".to_string(),
                    message: "no route file given and none configured".to_string(),
                })?;

            let table = RouteTable::load_from_file(&path).map_err(|e| CliError::CommandFailed {
                message: e.to_string(),
            })?;

            println!("{}: {} rules", path.display(), table.len());
            for rule in table.rules() {
                let state = if rule.enabled { "enabled" } else { "disabled" };
                println!(
                    "  {:<24} {:>2} condition(s)  [{}]  {}",
                    rule.event_pattern,
                    rule.conditions.len(),
                    state,
                    rule.description.as_deref().unwrap_or("")
                );
            }
            Ok(())
        }
        RouteCommands::Init { file, force } => {
            if file.exists() && !force {
                return Err(CliError::CommandFailed {
                    message: format!("{} already exists (use --force to overwrite)", file.display()),
                });
            }

            let rules = default_routes();
            let yaml = serde_yaml::to_string(&rules).map_err(|e| CliError::CommandFailed {
                message: e.to_string(),
            })?;

            if let Some(parent) = file.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&file, yaml)?;

            println!("Wrote {} default rules to {}", rules.len(), file.display());
            Ok(())
        }
    }
}

/// Execute cost command
fn execute_cost_command(action: CostCommands, config: &ServiceConfig) -> Result<(), CliError> {
    let cost_tracker = CostTracker::new(
        config.agent.cost_ledger.clone(),
        config.agent.max_budget_usd,
    );

    match action {
        CostCommands::Report { json } => {
            let report = cost_tracker.report();

            if json {
                let rendered =
                    serde_json::to_string_pretty(&report).map_err(|e| CliError::CommandFailed {
                        message: e.to_string(),
                    })?;
                println!("{rendered}");
            } else {
                println!("Total cost:     ${:.4}", report.total_cost_usd);
                println!("Sessions:       {}", report.total_sessions);
                println!("Total tokens:   {}", report.total_tokens);
                match (report.budget_limit_usd, report.remaining_budget_usd) {
                    (Some(limit), Some(remaining)) => {
                        println!("Budget:         ${remaining:.4} of ${limit:.2} remaining");
                    }
                    _ => println!("Budget:         no limit set"),
                }
                println!(
                    "Avg / session:  ${:.4}",
                    report.average_cost_per_session
                );
            }
            Ok(())
        }
        CostCommands::Reset { yes } => {
            if !yes {
                return Err(CliError::CommandFailed {
                    message: "refusing to reset the cost ledger without --yes".to_string(),
                });
            }

            cost_tracker.reset();
            println!("Cost ledger reset");
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
