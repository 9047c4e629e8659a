use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::ProviderError;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const MAX_REPLY_TOKENS: u32 = 1024;

/// A chat-completion backend bound to one model. Each call carries the
/// sender's framing and the prompt built from its inbound messages.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, ProviderError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vendor {
    Anthropic,
    OpenAI,
    Ollama,
}

impl Vendor {
    pub fn as_str(&self) -> &str {
        match self {
            Vendor::Anthropic => "Anthropic",
            Vendor::OpenAI => "OpenAI",
            Vendor::Ollama => "Ollama",
        }
    }

    fn endpoint(&self, base_url: &str) -> String {
        match self {
            Vendor::Anthropic => format!("{}/v1/messages", base_url),
            Vendor::OpenAI => format!("{}/v1/chat/completions", base_url),
            Vendor::Ollama => format!("{}/api/chat", base_url),
        }
    }

    fn request_body(&self, model: &str, system: &str, prompt: &str) -> Value {
        match self {
            Vendor::Anthropic => json!({
                "model": model,
                "max_tokens": MAX_REPLY_TOKENS,
                "system": system,
                "messages": [{ "role": "user", "content": prompt }],
            }),
            Vendor::OpenAI => json!({
                "model": model,
                "max_tokens": MAX_REPLY_TOKENS,
                "messages": [
                    { "role": "system", "content": system },
                    { "role": "user", "content": prompt },
                ],
            }),
            Vendor::Ollama => json!({
                "model": model,
                "stream": false,
                "messages": [
                    { "role": "system", "content": system },
                    { "role": "user", "content": prompt },
                ],
            }),
        }
    }

    fn reply_text<'a>(&self, body: &'a Value) -> Option<&'a str> {
        let text = match self {
            Vendor::Anthropic => &body["content"][0]["text"],
            Vendor::OpenAI => &body["choices"][0]["message"]["content"],
            Vendor::Ollama => &body["message"]["content"],
        };
        text.as_str()
    }
}

/// HTTP chat backend for one vendor and model.
#[derive(Debug, Clone)]
pub struct ChatBackend {
    vendor: Vendor,
    model: String,
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl ChatBackend {
    fn new(vendor: Vendor, model: String, base_url: String, api_key: Option<String>) -> Self {
        Self {
            vendor,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    pub fn anthropic(api_key: String, model: impl Into<String>) -> Self {
        Self::new(
            Vendor::Anthropic,
            model.into(),
            "https://api.anthropic.com".to_string(),
            Some(api_key),
        )
    }

    pub fn openai(api_key: String, model: impl Into<String>) -> Self {
        Self::new(
            Vendor::OpenAI,
            model.into(),
            "https://api.openai.com".to_string(),
            Some(api_key),
        )
    }

    pub fn ollama(base_url: Option<String>, model: impl Into<String>) -> Self {
        Self::new(
            Vendor::Ollama,
            model.into(),
            base_url.unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            None,
        )
    }

    pub fn vendor(&self) -> Vendor {
        self.vendor
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request(&self, system: &str, prompt: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .post(self.vendor.endpoint(&self.base_url))
            .json(&self.vendor.request_body(&self.model, system, prompt));

        match (self.vendor, &self.api_key) {
            (Vendor::Anthropic, Some(key)) => builder
                .header("x-api-key", key)
                .header("anthropic-version", "2023-06-01"),
            (Vendor::OpenAI, Some(key)) => builder.bearer_auth(key),
            _ => builder,
        }
    }

    /// Maps a non-success HTTP status onto the provider error taxonomy.
    async fn check_status(&self, response: reqwest::Response) -> Result<Value, ProviderError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        match status {
            reqwest::StatusCode::TOO_MANY_REQUESTS => Err(ProviderError::RateLimited),
            reqwest::StatusCode::NOT_FOUND => {
                Err(ProviderError::InvalidModelLabel(self.model.clone()))
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(ProviderError::Unavailable(format!(
                    "{} API error {}: {}",
                    self.vendor.as_str(),
                    status,
                    body
                )))
            }
        }
    }
}

#[async_trait]
impl LLMProvider for ChatBackend {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, ProviderError> {
        let response = self.request(system, prompt).send().await?;
        let body = self.check_status(response).await?;

        self.vendor
            .reply_text(&body)
            .map(str::to_string)
            .ok_or_else(|| {
                ProviderError::Unavailable(format!("{} reply had no text", self.vendor.as_str()))
            })
    }
}

// Mock provider for testing
pub struct MockLLMProvider {
    response: Result<String, ProviderError>,
}

impl MockLLMProvider {
    pub fn new() -> Self {
        Self {
            response: Ok("ACK - mock completion".to_string()),
        }
    }

    pub fn with_response(response: String) -> Self {
        Self {
            response: Ok(response),
        }
    }

    pub fn failing(error: ProviderError) -> Self {
        Self {
            response: Err(error),
        }
    }
}

impl Default for MockLLMProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LLMProvider for MockLLMProvider {
    async fn complete(&self, _system: &str, _prompt: &str) -> Result<String, ProviderError> {
        self.response.clone()
    }
}
