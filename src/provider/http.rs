//! HTTP provider clients.
//!
//! - [`OpenAiProvider`]: OpenAI chat completions, also used for xAI through
//!   its OpenAI-compatible endpoint
//! - [`AnthropicProvider`]: Anthropic messages API
//! - [`GoogleProvider`]: Gemini `generateContent`
//!
//! Every client takes its API key at construction and accepts a base-URL
//! override so it can be pointed at a proxy or a local mock server.

use super::{Provider, ProviderError, ProviderKind};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const XAI_BASE_URL: &str = "https://api.x.ai/v1";
const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const GOOGLE_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Send a prepared request and decode a JSON body, mapping every failure
/// onto [`ProviderError`].
async fn send_json<T: DeserializeOwned>(
    provider: ProviderKind,
    request: reqwest::RequestBuilder,
) -> Result<T, ProviderError> {
    let response = request.send().await.map_err(|e| ProviderError::Request {
        provider,
        message: e.to_string(),
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Status {
            provider,
            status: status.as_u16(),
            body,
        });
    }

    response.json::<T>().await.map_err(|e| ProviderError::Parse {
        provider,
        message: e.to_string(),
    })
}

fn non_empty(provider: ProviderKind, text: String) -> Result<String, ProviderError> {
    if text.trim().is_empty() {
        Err(ProviderError::EmptyResponse(provider))
    } else {
        Ok(text)
    }
}

// ============================================================================
// OpenAI / xAI
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI chat-completions client.
///
/// ## Example
///
/// ```no_run
/// use reason_orchestrator::provider::OpenAiProvider;
///
/// let provider = OpenAiProvider::new("sk-...")
///     .with_max_tokens(512)
///     .with_temperature(0.2);
/// ```
pub struct OpenAiProvider {
    client: reqwest::Client,
    kind: ProviderKind,
    api_key: String,
    base_url: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiProvider {
    /// Client for the OpenAI API.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_kind(ProviderKind::OpenAi, api_key.into(), OPENAI_BASE_URL)
    }

    /// Client for xAI's OpenAI-compatible endpoint.
    pub fn xai(api_key: impl Into<String>) -> Self {
        Self::with_kind(ProviderKind::Xai, api_key.into(), XAI_BASE_URL)
    }

    fn with_kind(kind: ProviderKind, api_key: String, base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            kind,
            api_key,
            base_url: base_url.to_string(),
            max_tokens: 1024,
            temperature: 0.2,
        }
    }

    /// Override the API base URL (everything before `/chat/completions`).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set maximum tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set temperature (0.0 - 2.0).
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn invoke(
        &self,
        prompt: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<String, ProviderError> {
        let body = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };
        debug!(provider = %self.kind, model = model, "sending chat completion");

        let request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(&body);
        let response: ChatResponse = send_json(self.kind, request).await?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        non_empty(self.kind, text)
    }
}

// ============================================================================
// Anthropic
// ============================================================================

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

/// Anthropic messages-API client.
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    max_tokens: u32,
}

impl AnthropicProvider {
    /// Client for the Anthropic API.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: ANTHROPIC_BASE_URL.to_string(),
            max_tokens: 1024,
        }
    }

    /// Override the API base URL (everything before `/v1/messages`).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set maximum tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    async fn invoke(
        &self,
        prompt: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<String, ProviderError> {
        let body = MessagesRequest {
            model,
            max_tokens: self.max_tokens,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };
        debug!(provider = "anthropic", model = model, "sending message");

        let request = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .timeout(timeout)
            .json(&body);
        let response: MessagesResponse = send_json(ProviderKind::Anthropic, request).await?;

        let text: String = response
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect();
        non_empty(ProviderKind::Anthropic, text)
    }
}

// ============================================================================
// Google
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<GenerateContent<'a>>,
}

#[derive(Debug, Serialize)]
struct GenerateContent<'a> {
    parts: Vec<GeneratePart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeneratePart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

/// Google Gemini client.
pub struct GoogleProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GoogleProvider {
    /// Client for the Gemini API.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: GOOGLE_BASE_URL.to_string(),
        }
    }

    /// Override the API base URL (everything before `/v1beta/models`).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl Provider for GoogleProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    async fn invoke(
        &self,
        prompt: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<String, ProviderError> {
        let body = GenerateRequest {
            contents: vec![GenerateContent {
                parts: vec![GeneratePart { text: prompt }],
            }],
        };
        debug!(provider = "google", model = model, "sending generateContent");

        let request = self
            .client
            .post(format!(
                "{}/v1beta/models/{model}:generateContent",
                self.base_url
            ))
            .header("x-goog-api-key", &self.api_key)
            .timeout(timeout)
            .json(&body);
        let response: GenerateResponse = send_json(ProviderKind::Google, request).await?;

        let text: String = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        non_empty(ProviderKind::Google, text)
    }
}
