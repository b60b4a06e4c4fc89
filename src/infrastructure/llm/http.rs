use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::domain::ports::{BackendError, EnrichmentBackend};

const LOCAL_SYSTEM_PROMPT: &str = "You are a helpful Linux system administrator AI. \
Give direct, actionable advice. Do not ask questions or request clarification. \
Just provide the answer.";

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_CLAUDE_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4";

/// Lines containing any of these are prompt echoes or filler from small
/// local models and are dropped from the output.
const ECHO_PATTERNS: &[&str] = &[
    "Please provide",
    "Please note",
    "Please give",
    "You are a",
    "As a Linux",
    "As an AI",
    "I'd be happy to",
    "Here's my response",
    "Here is my response",
    "Let me help",
    "I can help",
    "(2-3 sentences",
    "sentences max)",
    "Be specific and concise",
    "brief, actionable",
    "Hint:",
    "Note:",
];

/// Wire flavour of an HTTP completion endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpProvider {
    /// llama.cpp `llama-server` native `/completion` endpoint.
    Local,
    /// Anthropic Messages API.
    Claude,
    /// OpenAI Chat Completions API.
    OpenAi,
}

impl HttpProvider {
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "local" => Some(Self::Local),
            "claude" => Some(Self::Claude),
            "openai" => Some(Self::OpenAi),
            _ => None,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Claude => "claude",
            Self::OpenAi => "openai",
        }
    }

    #[must_use]
    pub const fn default_base_url(self) -> &'static str {
        match self {
            Self::Local => "http://127.0.0.1:8085",
            Self::Claude => "https://api.anthropic.com",
            Self::OpenAi => "https://api.openai.com",
        }
    }

    const fn requires_api_key(self) -> bool {
        !matches!(self, Self::Local)
    }
}

/// Enrichment backend speaking to an HTTP completion service.
pub struct HttpBackend {
    provider: HttpProvider,
    base_url: String,
    api_key: Option<String>,
    model: Option<String>,
    client: reqwest::Client,
}

impl HttpBackend {
    /// Build a backend for `provider`.
    ///
    /// `base_url` falls back to the provider's public endpoint. Cloud
    /// providers without an API key are created but report themselves as
    /// not configured.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::ServiceUnavailable` if the HTTP client
    /// cannot be initialized.
    pub fn new(
        provider: HttpProvider,
        base_url: Option<String>,
        api_key: Option<String>,
        model: Option<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                BackendError::ServiceUnavailable(format!("cannot create HTTP client: {e}"))
            })?;

        let base_url = base_url
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| provider.default_base_url().to_string());

        Ok(Self {
            provider,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.is_empty()),
            model: model.filter(|m| !m.is_empty()),
            client,
        })
    }

    #[must_use]
    pub const fn provider(&self) -> HttpProvider {
        self.provider
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn api_key(&self) -> Result<&str, BackendError> {
        self.api_key.as_deref().ok_or(BackendError::NotConfigured)
    }

    fn build_request(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<reqwest::RequestBuilder, BackendError> {
        let request = match self.provider {
            HttpProvider::Local => {
                let body = json!({
                    "prompt": format_local_prompt(prompt),
                    "n_predict": max_tokens,
                    "temperature": temperature,
                    "stop": ["</s>", "[INST]", "[/INST]"],
                    "stream": false,
                });
                self.client
                    .post(format!("{}/completion", self.base_url))
                    .json(&body)
            }
            HttpProvider::Claude => {
                let body = json!({
                    "model": self.model.as_deref().unwrap_or(DEFAULT_CLAUDE_MODEL),
                    "max_tokens": max_tokens,
                    "temperature": temperature,
                    "messages": [{ "role": "user", "content": prompt }],
                });
                self.client
                    .post(format!("{}/v1/messages", self.base_url))
                    .header("x-api-key", self.api_key()?)
                    .header("anthropic-version", ANTHROPIC_VERSION)
                    .json(&body)
            }
            HttpProvider::OpenAi => {
                let body = json!({
                    "model": self.model.as_deref().unwrap_or(DEFAULT_OPENAI_MODEL),
                    "max_tokens": max_tokens,
                    "temperature": temperature,
                    "messages": [{ "role": "user", "content": prompt }],
                });
                self.client
                    .post(format!("{}/v1/chat/completions", self.base_url))
                    .bearer_auth(self.api_key()?)
                    .json(&body)
            }
        };
        Ok(request)
    }
}

#[async_trait]
impl EnrichmentBackend for HttpBackend {
    fn name(&self) -> &str {
        self.provider.name()
    }

    fn is_configured(&self) -> bool {
        !self.provider.requires_api_key() || self.api_key.is_some()
    }

    async fn generate(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, BackendError> {
        let request = self.build_request(prompt, max_tokens, temperature)?;
        debug!(provider = self.provider.name(), url = %self.base_url, "calling LLM endpoint");

        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(_) if !status.is_success() => {
                return Err(BackendError::ServiceUnavailable(format!("HTTP {status}")));
            }
            Err(e) => return Err(BackendError::InvalidResponse(e.to_string())),
        };

        let text = match self.provider {
            HttpProvider::Local => parse_local(&body).map(|raw| clean_local_output(&raw))?,
            HttpProvider::Claude => parse_claude(&body)?,
            HttpProvider::OpenAi => parse_openai(&body)?,
        };

        let text = text.trim();
        if text.is_empty() {
            return Err(BackendError::EmptyResponse);
        }
        Ok(text.to_string())
    }
}

fn map_transport_error(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout
    } else {
        BackendError::ServiceUnavailable(err.to_string())
    }
}

fn format_local_prompt(prompt: &str) -> String {
    format!("<s>[INST] <<SYS>>\n{LOCAL_SYSTEM_PROMPT}\n<</SYS>>\n\n{prompt} [/INST]")
}

/// Extract an error message from a provider error body, if present.
fn error_message(body: &Value) -> Option<String> {
    let error = body.get("error")?;
    Some(
        error
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| error.to_string(), str::to_string),
    )
}

fn parse_local(body: &Value) -> Result<String, BackendError> {
    if let Some(message) = error_message(body) {
        return Err(BackendError::ServiceUnavailable(message));
    }
    body.get("content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| BackendError::InvalidResponse("missing \"content\" field".into()))
}

fn parse_claude(body: &Value) -> Result<String, BackendError> {
    if let Some(message) = error_message(body) {
        return Err(BackendError::ServiceUnavailable(message));
    }
    body.pointer("/content/0/text")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| BackendError::InvalidResponse("missing content[0].text".into()))
}

fn parse_openai(body: &Value) -> Result<String, BackendError> {
    if let Some(message) = error_message(body) {
        return Err(BackendError::ServiceUnavailable(message));
    }
    body.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            BackendError::InvalidResponse("missing choices[0].message.content".into())
        })
}

/// Drop echoed instructions and blank lines from local model output.
fn clean_local_output(raw: &str) -> String {
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !ECHO_PATTERNS.iter().any(|p| line.contains(p)))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
