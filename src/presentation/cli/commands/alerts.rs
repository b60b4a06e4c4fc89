use anyhow::Context;
use colored::Colorize;
use serde_json::Value;

use super::call;
use crate::domain::entities::Alert;
use crate::domain::value_objects::Severity;
use crate::infrastructure::ipc::{IpcClient, Request};
use crate::presentation::cli::formatters::alert_fmt::{format_alerts, print_no_alerts};

/// Build the `alerts` request: active alerts by default, everything with `all`.
///
/// # Errors
///
/// Returns an error if `severity` is not a known level.
pub fn alerts_request(severity: Option<&str>, all: bool) -> anyhow::Result<Request> {
    let mut request = Request::new("alerts");
    if let Some(raw) = severity {
        let severity: Severity = raw.parse().map_err(anyhow::Error::msg)?;
        request = request.with_param("severity", severity.as_str());
    }
    request = if all {
        request.with_param("include_dismissed", true)
    } else {
        request.with_param("status", "active")
    };
    Ok(request)
}

/// # Errors
///
/// Returns an error if the daemon does not answer or the list cannot be decoded.
pub async fn run_alerts(
    client: &IpcClient,
    severity: Option<&str>,
    all: bool,
    json: bool,
) -> anyhow::Result<()> {
    let result = call(client, alerts_request(severity, all)?).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }
    let alerts: Vec<Alert> = serde_json::from_value(
        result.get("alerts").cloned().unwrap_or(Value::Array(Vec::new())),
    )
    .context("Failed to decode alert list")?;
    if alerts.is_empty() {
        print_no_alerts();
    } else {
        format_alerts(&alerts);
        println!("{} alert(s)", alerts.len());
    }
    Ok(())
}

fn target_request(method: &str, id: Option<&str>, all: bool) -> anyhow::Result<Request> {
    let request = Request::new(method);
    match (id, all) {
        (_, true) => Ok(request.with_param("all", true)),
        (Some(id), false) => Ok(request.with_param("id", id)),
        (None, false) => anyhow::bail!("an alert id or --all is required"),
    }
}

/// # Errors
///
/// Returns an error if the daemon does not answer or the alert does not exist.
pub async fn run_ack(client: &IpcClient, id: Option<&str>, all: bool) -> anyhow::Result<()> {
    let result = call(client, target_request("alerts.acknowledge", id, all)?).await?;
    if let Some(count) = result.get("acknowledged_count").and_then(Value::as_u64) {
        println!("{} {count} alert(s) acknowledged", "✔".green());
    } else if result.get("acknowledged").and_then(Value::as_bool) == Some(true) {
        println!("{} alert acknowledged", "✔".green());
    } else {
        println!("{}", "Alert was not active, nothing to acknowledge".yellow());
    }
    Ok(())
}

/// # Errors
///
/// Returns an error if the daemon does not answer or the alert does not exist.
pub async fn run_dismiss(client: &IpcClient, id: Option<&str>, all: bool) -> anyhow::Result<()> {
    let result = call(client, target_request("alerts.dismiss", id, all)?).await?;
    if let Some(count) = result.get("dismissed_count").and_then(Value::as_u64) {
        println!("{} {count} alert(s) dismissed", "✔".green());
    } else if result.get("dismissed").and_then(Value::as_bool) == Some(true) {
        println!("{} alert dismissed", "✔".green());
    } else {
        println!("{}", "Alert was already dismissed".yellow());
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_request_lists_active_alerts() {
        let request = alerts_request(None, false).expect("request");
        assert_eq!(request.method, "alerts");
        assert_eq!(request.params.get("status"), Some(&json!("active")));
        assert!(request.params.get("include_dismissed").is_none());
    }

    #[test]
    fn all_includes_dismissed_and_normalizes_severity() {
        let request = alerts_request(Some("CRIT"), true).expect("request");
        assert_eq!(request.params.get("severity"), Some(&json!("critical")));
        assert_eq!(request.params.get("include_dismissed"), Some(&json!(true)));
        assert!(request.params.get("status").is_none());
    }

    #[test]
    fn unknown_severity_is_rejected_locally() {
        let err = alerts_request(Some("loud"), false).expect_err("bad severity");
        assert!(err.to_string().contains("unknown severity"));
    }

    #[test]
    fn target_prefers_all() {
        let request = target_request("alerts.dismiss", None, true).expect("request");
        assert_eq!(request.params.get("all"), Some(&json!(true)));

        let request = target_request("alerts.acknowledge", Some("a1"), false).expect("request");
        assert_eq!(request.params.get("id"), Some(&json!("a1")));

        assert!(target_request("alerts.dismiss", None, false).is_err());
    }
}
