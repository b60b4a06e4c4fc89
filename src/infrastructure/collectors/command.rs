use std::process::Output;
use std::time::Duration;

use tokio::process::Command;

use crate::domain::ports::collector::CollectionError;

/// Runs `program` with `args` under `timeout`, with `LC_ALL=C`.
///
/// Returns `Ok(None)` when the program is not installed. A child still
/// running at the deadline is killed.
///
/// # Errors
///
/// Returns `CollectionError::Timeout` past the deadline,
/// `CollectionError::PermissionDenied` if the program cannot be executed, and
/// `CollectionError::MetricsUnavailable` for any other spawn failure.
pub async fn run(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<Option<Output>, CollectionError> {
    let output = tokio::time::timeout(
        timeout,
        Command::new(program)
            .args(args)
            .env("LC_ALL", "C")
            .kill_on_drop(true)
            .output(),
    )
    .await
    .map_err(|_| CollectionError::Timeout)?;

    match output {
        Ok(output) => Ok(Some(output)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(CollectionError::PermissionDenied(format!("{program}: {e}")))
        }
        Err(e) => Err(CollectionError::MetricsUnavailable(format!(
            "failed to run {program}: {e}"
        ))),
    }
}
