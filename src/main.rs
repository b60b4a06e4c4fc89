use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use hostwatch::application::config::{AppConfig, ConfigManager};
use hostwatch::presentation::cli::app::{Cli, Commands};
use hostwatch::presentation::cli::commands::alerts::{run_ack, run_alerts, run_dismiss};
use hostwatch::presentation::cli::commands::client_for;
use hostwatch::presentation::cli::commands::control::{run_check, run_reload, run_shutdown};
use hostwatch::presentation::cli::commands::daemon::run_daemon;
use hostwatch::presentation::cli::commands::status::{run_health, run_ping, run_status};

fn print_banner() {
    println!("{}", "━".repeat(40).cyan());
    println!("{}", "  HOSTWATCH — Host Health Monitor".bold().cyan());
    println!("{}", "━".repeat(40).cyan());
}

fn setup_tracing(level: &str, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let path = match cli.config {
        Some(ref path) => path.clone(),
        None => AppConfig::default_path()?,
    };
    let config = Arc::new(ConfigManager::open(path)?);
    let current = config.get();

    setup_tracing(&current.general.log_level, cli.verbose);

    let client = client_for(&current);
    match cli.command {
        Some(Commands::Daemon { in_memory }) => {
            print_banner();
            run_daemon(config, in_memory).await?;
        }
        None => {
            print_banner();
            run_daemon(config, false).await?;
        }
        Some(Commands::Ping) => run_ping(&client).await?,
        Some(Commands::Status { json }) => run_status(&client, json).await?,
        Some(Commands::Health { refresh, json }) => run_health(&client, refresh, json).await?,
        Some(Commands::Alerts {
            ref severity,
            all,
            json,
        }) => run_alerts(&client, severity.as_deref(), all, json).await?,
        Some(Commands::Ack { ref id, all }) => run_ack(&client, id.as_deref(), all).await?,
        Some(Commands::Dismiss { ref id, all }) => {
            run_dismiss(&client, id.as_deref(), all).await?;
        }
        Some(Commands::Check) => run_check(&client).await?,
        Some(Commands::Reload) => run_reload(&client).await?,
        Some(Commands::Shutdown) => run_shutdown(&client).await?,
    }

    Ok(())
}
