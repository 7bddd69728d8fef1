use task_keeper_cli::run_cli;
use tracing::error;

#[tokio::main]
async fn main() {
    // Run CLI and handle errors
    if let Err(e) = run_cli().await {
        error!("CLI error: {}", e);
        eprintln!("Error: {e}");

        // Exit with appropriate code based on error type
        let exit_code = match e {
            task_keeper_cli::CliError::Configuration { .. } => 1,
            task_keeper_cli::CliError::Service(_) => 2,
            task_keeper_cli::CliError::CommandFailed { .. } => 3,
            task_keeper_cli::CliError::InvalidArgument { .. } => 4,
            task_keeper_cli::CliError::Io(_) => 5,
        };

        std::process::exit(exit_code);
    }
}
