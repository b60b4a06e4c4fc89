use colored::Colorize;
use serde_json::Value;

use super::call;
use crate::infrastructure::ipc::{IpcClient, Request};

/// # Errors
///
/// Returns an error if the daemon does not answer.
pub async fn run_check(client: &IpcClient) -> anyhow::Result<()> {
    call(client, Request::new("check")).await?;
    println!("{} health check requested", "✔".green());
    Ok(())
}

/// # Errors
///
/// Returns an error if the daemon does not answer or rejects the new configuration.
pub async fn run_reload(client: &IpcClient) -> anyhow::Result<()> {
    let result = call(client, Request::new("config.reload")).await?;
    let interval = result
        .get("check_interval_secs")
        .and_then(Value::as_u64)
        .unwrap_or_default();
    println!(
        "{} configuration reloaded (check interval {interval}s)",
        "✔".green()
    );
    Ok(())
}

/// # Errors
///
/// Returns an error if the daemon does not answer.
pub async fn run_shutdown(client: &IpcClient) -> anyhow::Result<()> {
    call(client, Request::new("shutdown")).await?;
    println!("{}", "Daemon shutting down".yellow().bold());
    Ok(())
}
