use async_trait::async_trait;

use crate::domain::ports::{BackendError, EnrichmentBackend};

/// Backend used when enrichment is disabled or the provider is unknown.
///
/// Never configured, so the enrichment pool skips submissions entirely.
pub struct NoopBackend;

impl NoopBackend {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for NoopBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EnrichmentBackend for NoopBackend {
    fn name(&self) -> &str {
        "none"
    }

    fn is_configured(&self) -> bool {
        false
    }

    async fn generate(
        &self,
        _prompt: &str,
        _max_tokens: u32,
        _temperature: f32,
    ) -> Result<String, BackendError> {
        Err(BackendError::NotConfigured)
    }
}
