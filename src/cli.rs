//! CLI definitions for Syncbox.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Syncbox CLI.
#[derive(Parser)]
#[command(name = "syncbox")]
#[command(about = "Durable offline delivery queue for feature requests")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "syncbox.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the queue in foreground until interrupted (default)
    Run,

    /// Queue a feature for delivery
    Enqueue {
        /// Feature name sent as the request body
        feature: String,
    },

    /// Run a single drain cycle and print the result
    Drain,

    /// List queued entries
    List {
        /// Output format (table, json)
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Show queue length and delivery endpoint
    Status,
}
