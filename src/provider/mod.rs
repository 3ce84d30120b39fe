//! # Stage: Provider Boundary
//!
//! ## Responsibility
//! Give the pipeline one capability, "send a prompt to a model and get text
//! back", over a closed set of named providers plus an offline deterministic
//! provider for tests and demos.
//!
//! ## Guarantees
//! - Object-safe: every provider is usable as `Arc<dyn Provider>`
//! - Bounded: [`invoke_with_timeout`] never waits longer than the given timeout
//! - Explicit failure: every network, status, parse and timeout failure is a
//!   [`ProviderError`] variant, never a panic
//!
//! ## NOT Responsible For
//! - Retrying (callers decide: the solver retries, the critic degrades)
//! - Prompt construction (that belongs to `stages`)

pub mod deterministic;
pub mod http;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub use deterministic::DeterministicProvider;
pub use http::{AnthropicProvider, GoogleProvider, OpenAiProvider};

/// Named provider tags accepted in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// OpenAI chat completions.
    #[serde(alias = "openai")]
    OpenAi,
    /// Anthropic messages API.
    Anthropic,
    /// Google Gemini `generateContent`.
    Google,
    /// xAI (OpenAI-compatible endpoint).
    Xai,
    /// Offline deterministic provider.
    Mock,
}

impl ProviderKind {
    /// Stable snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "open_ai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Google => "google",
            ProviderKind::Xai => "xai",
            ProviderKind::Mock => "mock",
        }
    }

    /// Whether the provider talks to a network API and needs credentials.
    pub fn requires_credentials(&self) -> bool {
        !matches!(self, ProviderKind::Mock)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures of a single provider call.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport-level failure (DNS, connect, TLS, body read).
    #[error("{provider} request failed: {message}")]
    Request {
        /// Provider that failed.
        provider: ProviderKind,
        /// Underlying error text.
        message: String,
    },

    /// The API answered with a non-success status.
    #[error("{provider} API error {status}: {body}")]
    Status {
        /// Provider that failed.
        provider: ProviderKind,
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// The response body did not have the expected shape.
    #[error("failed to parse {provider} response: {message}")]
    Parse {
        /// Provider that failed.
        provider: ProviderKind,
        /// Deserialisation error text.
        message: String,
    },

    /// The response parsed but carried no text.
    #[error("{0} response contained no text")]
    EmptyResponse(ProviderKind),

    /// The call did not complete in time.
    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),

    /// A network provider was configured without credentials.
    #[error("provider {0} requires credentials")]
    MissingCredentials(ProviderKind),
}

/// A model backend.
///
/// Implementations must be thread-safe (`Send + Sync`); the pipeline shares
/// one provider across concurrent runs via `Arc<dyn Provider>`.
#[async_trait]
pub trait Provider: Send + Sync {
    /// The provider's tag.
    fn kind(&self) -> ProviderKind;

    /// Send `prompt` to `model` and return the response text.
    ///
    /// # Errors
    ///
    /// Any [`ProviderError`]; callers decide whether to retry or fall back.
    async fn invoke(
        &self,
        prompt: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<String, ProviderError>;
}

/// Invoke a provider, bounding the whole call (including connection setup)
/// by `timeout`.
///
/// # Errors
///
/// [`ProviderError::Timeout`] when the deadline passes, otherwise whatever
/// the provider returned.
///
/// # Panics
///
/// This function never panics.
pub async fn invoke_with_timeout(
    provider: &dyn Provider,
    prompt: &str,
    model: &str,
    timeout: Duration,
) -> Result<String, ProviderError> {
    match tokio::time::timeout(timeout, provider.invoke(prompt, model, timeout)).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout(timeout)),
    }
}

/// Build the provider registered under `kind`.
///
/// # Errors
///
/// [`ProviderError::MissingCredentials`] when a network provider is given an
/// empty credential string.
///
/// # Panics
///
/// This function never panics.
pub fn build_provider(
    kind: ProviderKind,
    credentials: &str,
) -> Result<Arc<dyn Provider>, ProviderError> {
    if kind.requires_credentials() && credentials.trim().is_empty() {
        return Err(ProviderError::MissingCredentials(kind));
    }
    let provider: Arc<dyn Provider> = match kind {
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(credentials)),
        ProviderKind::Xai => Arc::new(OpenAiProvider::xai(credentials)),
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(credentials)),
        ProviderKind::Google => Arc::new(GoogleProvider::new(credentials)),
        ProviderKind::Mock => Arc::new(DeterministicProvider::new()),
    };
    Ok(provider)
}
