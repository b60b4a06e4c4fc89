use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// hostwatch: host health monitor with AI-enriched alerts
///
/// Runs a monitoring daemon that samples CPU, memory, disk and pending
/// package updates, raises alerts on threshold breaches, and answers
/// local clients over a Unix socket.
#[derive(Parser, Debug)]
#[command(name = "hostwatch")]
#[command(version, about, long_about)]
pub struct Cli {
    /// Subcommand to execute (defaults to `daemon`)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to custom config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the monitoring daemon
    #[command(alias = "d")]
    Daemon {
        /// Keep alerts in memory instead of the SQLite database
        #[arg(long)]
        in_memory: bool,
    },

    /// Check that the daemon answers
    Ping,

    /// Show daemon status
    #[command(alias = "s")]
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the latest health snapshot
    #[command(alias = "h")]
    Health {
        /// Run a check now instead of returning the cached snapshot
        #[arg(short, long)]
        refresh: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List alerts
    #[command(alias = "a")]
    Alerts {
        /// Only show alerts of this severity (info, warning, error, critical)
        #[arg(short, long)]
        severity: Option<String>,

        /// Include acknowledged and dismissed alerts
        #[arg(long)]
        all: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Acknowledge an alert
    Ack {
        /// Alert id
        #[arg(required_unless_present = "all")]
        id: Option<String>,

        /// Acknowledge every active alert
        #[arg(long, conflicts_with = "id")]
        all: bool,
    },

    /// Dismiss an alert
    Dismiss {
        /// Alert id
        #[arg(required_unless_present = "all")]
        id: Option<String>,

        /// Dismiss every alert that is not already dismissed
        #[arg(long, conflicts_with = "id")]
        all: bool,
    },

    /// Ask the daemon to run a health check on its next poll
    Check,

    /// Reload the daemon configuration file
    Reload,

    /// Stop the daemon
    Shutdown,
}
