use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("LLM backend not configured")]
    NotConfigured,
    #[error("LLM service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("invalid response from LLM: {0}")]
    InvalidResponse(String),
    #[error("LLM returned an empty response")]
    EmptyResponse,
    #[error("generation timed out")]
    Timeout,
}

/// Text-generation capability used to enrich alerts.
///
/// Providers are slow and unreliable by nature; callers must never assume
/// success or bounded latency beyond their own timeout.
#[async_trait]
pub trait EnrichmentBackend: Send + Sync {
    /// Short provider name for logs and status output.
    fn name(&self) -> &str;

    /// Whether the provider has what it needs to attempt a call.
    fn is_configured(&self) -> bool;

    /// Generate a completion for `prompt`.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the provider is unreachable, times out,
    /// or returns an unusable response.
    async fn generate(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_display() {
        let err = BackendError::ServiceUnavailable("connection refused".to_string());
        assert_eq!(err.to_string(), "LLM service unavailable: connection refused");
        assert_eq!(BackendError::Timeout.to_string(), "generation timed out");
    }
}
