use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::ports::{BackendError, EnrichmentBackend};

/// Maximum response size accepted from the claude CLI (4 MB).
const MAX_RESPONSE_BYTES: usize = 4 * 1024 * 1024;

/// Maximum stderr bytes included in error messages.
const MAX_STDERR_BYTES: usize = 512;

const DEFAULT_MODEL: &str = "sonnet";

/// Enrichment backend that shells out to the `claude` CLI in print mode.
pub struct ClaudeCliBackend {
    binary: String,
    model: String,
    timeout: Duration,
}

impl ClaudeCliBackend {
    #[must_use]
    pub fn new(binary: String, model: Option<String>, timeout: Duration) -> Self {
        Self {
            binary,
            model: model
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout,
        }
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl EnrichmentBackend for ClaudeCliBackend {
    fn name(&self) -> &str {
        "claude-cli"
    }

    fn is_configured(&self) -> bool {
        !self.binary.trim().is_empty()
    }

    // The CLI exposes no sampling knobs, so `max_tokens` and `temperature`
    // are left to its defaults.
    async fn generate(
        &self,
        prompt: &str,
        _max_tokens: u32,
        _temperature: f32,
    ) -> Result<String, BackendError> {
        let output = tokio::time::timeout(
            self.timeout,
            tokio::process::Command::new(&self.binary)
                .args([
                    "--print",
                    "--output-format",
                    "json",
                    "--model",
                    &self.model,
                    "--",
                    prompt,
                ])
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| BackendError::Timeout)?
        .map_err(|e| {
            BackendError::ServiceUnavailable(format!("failed to run {}: {e}", self.binary))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(
                &output.stderr[..output.stderr.len().min(MAX_STDERR_BYTES)],
            );
            return Err(BackendError::ServiceUnavailable(format!(
                "{} exited with {}: {stderr}",
                self.binary, output.status
            )));
        }

        if output.stdout.len() > MAX_RESPONSE_BYTES {
            return Err(BackendError::InvalidResponse(format!(
                "response too large: {} bytes",
                output.stdout.len()
            )));
        }

        parse_response(&output.stdout)
    }
}

#[derive(Deserialize)]
struct ClaudeCliResponse {
    result: String,
    #[serde(default)]
    is_error: bool,
}

/// Unwrap the `--output-format json` envelope, accepting bare text too.
fn parse_response(stdout: &[u8]) -> Result<String, BackendError> {
    let text = std::str::from_utf8(stdout)
        .map_err(|e| BackendError::InvalidResponse(format!("invalid UTF-8: {e}")))?;

    let inner = match serde_json::from_str::<ClaudeCliResponse>(text) {
        Ok(envelope) if envelope.is_error => {
            return Err(BackendError::ServiceUnavailable(envelope.result));
        }
        Ok(envelope) => envelope.result,
        Err(_) => text.to_owned(),
    };

    let inner = inner.trim();
    if inner.is_empty() {
        return Err(BackendError::EmptyResponse);
    }
    Ok(inner.to_string())
}
