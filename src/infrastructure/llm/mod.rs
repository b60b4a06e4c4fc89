pub mod claude_cli;
pub mod http;
pub mod noop;

use std::sync::Arc;
use std::time::Duration;

use crate::application::config::LlmConfig;
use crate::domain::ports::EnrichmentBackend;

use self::claude_cli::ClaudeCliBackend;
use self::http::{HttpBackend, HttpProvider};
use self::noop::NoopBackend;

/// Create the enrichment backend selected by configuration.
///
/// Returns [`NoopBackend`] when enrichment is disabled, the provider is
/// unknown, or the HTTP client cannot be built.
#[must_use]
pub fn create_backend(config: &LlmConfig) -> Arc<dyn EnrichmentBackend> {
    if !config.enabled {
        return Arc::new(NoopBackend::new());
    }
    let timeout = Duration::from_secs(config.timeout_secs.max(1));
    let provider = config.provider.trim();

    match provider {
        "none" | "" => Arc::new(NoopBackend::new()),
        "claude-cli" => Arc::new(ClaudeCliBackend::new(
            config.claude_binary.clone(),
            config.model.clone(),
            timeout,
        )),
        other => {
            let Some(kind) = HttpProvider::from_name(other) else {
                tracing::warn!(
                    provider = %config.provider,
                    "unknown LLM provider, falling back to none"
                );
                return Arc::new(NoopBackend::new());
            };
            let api_key = config
                .api_key_env
                .as_deref()
                .and_then(|var| std::env::var(var).ok());
            if kind != HttpProvider::Local && api_key.is_none() {
                tracing::warn!(
                    provider = kind.name(),
                    env = config.api_key_env.as_deref().unwrap_or("<unset>"),
                    "no API key available, enrichment will be skipped"
                );
            }
            match HttpBackend::new(
                kind,
                config.base_url.clone(),
                api_key,
                config.model.clone(),
                timeout,
            ) {
                Ok(backend) => Arc::new(backend),
                Err(e) => {
                    tracing::warn!("cannot build {} backend: {e}", kind.name());
                    Arc::new(NoopBackend::new())
                }
            }
        }
    }
}
