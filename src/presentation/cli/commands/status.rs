use std::time::Instant;

use anyhow::Context;
use colored::Colorize;

use super::call;
use crate::domain::entities::HealthSnapshot;
use crate::infrastructure::ipc::{IpcClient, Request};
use crate::presentation::cli::formatters::status_fmt::{print_health, print_status};
use crate::presentation::handlers::StatusReport;

/// # Errors
///
/// Returns an error if the daemon does not answer.
pub async fn run_ping(client: &IpcClient) -> anyhow::Result<()> {
    let started = Instant::now();
    call(client, Request::new("ping")).await?;
    println!(
        "{} ({} ms)",
        "pong".green().bold(),
        started.elapsed().as_millis()
    );
    Ok(())
}

/// # Errors
///
/// Returns an error if the daemon does not answer or the status cannot be decoded.
pub async fn run_status(client: &IpcClient, json: bool) -> anyhow::Result<()> {
    let result = call(client, Request::new("status")).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }
    let report: StatusReport =
        serde_json::from_value(result).context("Failed to decode daemon status")?;
    print_status(&report);
    Ok(())
}

/// # Errors
///
/// Returns an error if the daemon does not answer or the snapshot cannot be decoded.
pub async fn run_health(client: &IpcClient, refresh: bool, json: bool) -> anyhow::Result<()> {
    let mut request = Request::new("health");
    if refresh {
        request = request.with_param("refresh", true);
    }
    let result = call(client, request).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }
    let snapshot: HealthSnapshot =
        serde_json::from_value(result).context("Failed to decode health snapshot")?;
    println!("{}", "hostwatch — Host Health".bold().cyan());
    println!("{}", "━".repeat(50));
    print_health(&snapshot);
    Ok(())
}
