use std::time::Duration;

use tracing::debug;

use crate::domain::ports::collector::CollectionError;

use super::command;

/// Failed units as reported by `systemctl --failed`.
pub struct SystemdCollector {
    timeout: Duration,
}

impl SystemdCollector {
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Lists units in the `failed` state.
    ///
    /// Hosts without systemd (no `systemctl`, or a non-zero exit such as
    /// "System has not been booted with systemd") report no failures.
    ///
    /// # Errors
    ///
    /// Returns `CollectionError::Timeout` if `systemctl` does not finish in time.
    pub async fn collect(&self) -> Result<Vec<String>, CollectionError> {
        let Some(output) = command::run(
            "systemctl",
            &["--failed", "--no-pager", "--no-legend", "--plain"],
            self.timeout,
        )
        .await?
        else {
            return Ok(Vec::new());
        };

        if !output.status.success() {
            debug!(
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "systemctl unavailable, skipping service check"
            );
            return Ok(Vec::new());
        }

        Ok(parse_failed_units(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parses lines like `nginx.service loaded failed failed A high performance web server`.
///
/// Without `--plain` older systemd prefixes each line with a `●` marker.
fn parse_failed_units(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| {
            line.split_whitespace()
                .find(|token| *token != "●" && *token != "*")
                .map(str::to_string)
        })
        .collect()
}
