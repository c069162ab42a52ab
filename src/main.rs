//! Syncbox - durable offline delivery queue
//!
//! Main entry point for the Syncbox CLI.

mod cli;
mod commands;

use anyhow::{Context, bail};
use clap::Parser;
use tracing::warn;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use syncbox_config::{Config, ConfigLoader, ConfigValidator, LoggingConfig};

use crate::cli::{Cli, Commands};

/// Initialize tracing with console output and, when configured, a daily
/// rolling log file.
fn init_tracing(config: &LoggingConfig) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let file_layer = match config.dir {
        Some(ref dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("syncbox")
                .filename_suffix("log")
                .max_log_files(30)
                .build(dir)
                .context("Failed to create log file appender")?;

            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            // Flushes buffered lines on exit.
            static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
                std::sync::OnceLock::new();
            let _ = GUARD.set(guard);

            Some(fmt::layer().with_writer(non_blocking).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_ansi(true))
        .with(file_layer)
        .init();

    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let config = ConfigLoader::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;

    let result = ConfigValidator::validate(&config);
    if !result.is_valid() {
        let errors: Vec<String> = result.errors.iter().map(|e| e.to_string()).collect();
        bail!("Invalid configuration:\n  {}", errors.join("\n  "));
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    init_tracing(&config.logging)?;

    for warning in &ConfigValidator::validate(&config).warnings {
        warn!("Config {}: {}", warning.path, warning.message);
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => commands::run(config).await,
        Commands::Enqueue { feature } => commands::enqueue(config, feature).await,
        Commands::Drain => commands::drain(config).await,
        Commands::List { format } => commands::list(config, &format).await,
        Commands::Status => commands::status(config).await,
    }
}
