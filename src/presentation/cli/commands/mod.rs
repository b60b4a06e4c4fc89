pub mod alerts;
pub mod control;
pub mod daemon;
pub mod status;

use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use serde_json::Value;

use crate::application::config::AppConfig;
use crate::infrastructure::ipc::{IpcClient, Request};

/// Lower bound on how long a CLI command waits for the daemon; `health --refresh` runs a full check.
const MIN_CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the daemon socket named in `config`.
#[must_use]
pub fn client_for(config: &AppConfig) -> IpcClient {
    IpcClient::new(
        config.socket_path(),
        config.socket_timeout().max(MIN_CLIENT_TIMEOUT),
    )
}

/// Send `request` and unwrap the result, turning error responses into errors.
///
/// # Errors
///
/// Returns an error if the daemon is unreachable or answers with an error.
pub async fn call(client: &IpcClient, request: Request) -> anyhow::Result<Value> {
    let method = request.method.clone();
    let response = client
        .call(&request)
        .await
        .with_context(|| format!("'{method}' request failed"))?;
    if let Some(error) = response.error {
        bail!("daemon error {}: {}", error.code, error.message);
    }
    response
        .result
        .ok_or_else(|| anyhow!("daemon sent an empty result for '{method}'"))
}
