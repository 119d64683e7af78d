//! wakegate - transparent TCP relay that wakes its target on demand
//!
//! This is the main entry point for the wakegate CLI application.

use clap::Parser;
use std::process;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use wakegate::cli::{self, CliArgs, Commands, LogFormat, ServeArgs};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    // Initialize logging
    init_logging(args.log_format);

    let config_path = args.config.as_deref();

    // Execute subcommand
    let result = match args.command {
        None => cli::commands::serve::execute(config_path, ServeArgs::default()).await,
        Some(Commands::Serve(cmd)) => cli::commands::serve::execute(config_path, cmd).await,
        Some(Commands::Wake) => cli::commands::wake::execute(config_path).await,
        Some(Commands::Config(cmd)) => cli::commands::config::execute(config_path, cmd).await,
        Some(Commands::Version) => cli::commands::version::execute().await,
    };

    // Error handling
    if let Err(e) = result {
        error!("Command execution failed: {}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Initialize the logging system
fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wakegate=info"));

    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
    }

    info!("wakegate {} starting up", wakegate::VERSION);
}
