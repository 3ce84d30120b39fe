//! # reason-orchestrator
//!
//! A query-routing, multi-stage reasoning orchestrator in front of LLM
//! providers.
//!
//! ## Architecture
//!
//! Every query is classified once, then takes one of three paths:
//! ```text
//! query → classify ─┬─ quick respond                         (trivial queries)
//!                   ├─ cached verdict                        (near-duplicate of a good past run)
//!                   └─ structure → plan → solve → verify → repair? → unify → finalize
//!                                                              └→ trace store → template evolution
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! # use reason_orchestrator::{Orchestrator, ReasonerConfig, OrchestratorError};
//! # async fn example() -> Result<(), OrchestratorError> {
//! let orchestrator = Orchestrator::new();
//! orchestrator.init(ReasonerConfig::default()).await?;
//! let result = orchestrator.reason("What is 2 + 2?").await?;
//! println!("{} ({:.2})", result.verdict, result.confidence);
//! # Ok(()) }
//! ```

// ── Lint policy (aerospace-grade) ─────────────────────────────────────────
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![warn(missing_docs)]

use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub mod config;
pub mod engines;
pub mod evolution;
pub mod intelligence;
pub mod memory;
pub mod metrics;
pub(crate) mod patterns;
pub mod pipeline;
pub mod provider;
pub mod retry;
pub mod routing;
pub mod stages;
pub mod structure;

// Re-exports for convenience
pub use config::{ConfigError, ReasonerConfig};
pub use evolution::{EvolutionEngine, EvolutionError, EvolutionStats, PerformanceSample};
pub use memory::{MemoryError, MemoryStats, Trace, TraceStore};
pub use pipeline::{
    AuditTrail, Orchestrator, Reasoner, ReasoningMetadata, ReasoningPath, ReasoningResult,
};
pub use provider::{
    build_provider, DeterministicProvider, Provider, ProviderError, ProviderKind,
};
pub use routing::{classify, Classification, Domain, Mode, QueryType};

/// Initialise the global tracing subscriber.
///
/// Reads the `LOG_FORMAT` environment variable to choose output format:
/// - `"json"`: structured JSON output for log aggregators
/// - anything else (including unset): human-readable pretty output
///
/// Filter level is controlled by `RUST_LOG` and defaults to `info`.
///
/// # Errors
///
/// Returns [`OrchestratorError::Other`] if the global subscriber has already
/// been set (e.g. by a previous call or a test harness).
///
/// # Panics
///
/// This function never panics.
pub fn init_tracing() -> Result<(), OrchestratorError> {
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match format.as_str() {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter())
            .with_current_span(true)
            .with_span_list(true)
            .try_init(),
        _ => tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(filter())
            .try_init(),
    };

    result.map_err(|e| OrchestratorError::Other(format!("tracing init failed: {e}")))
}

/// Top-level orchestrator errors.
///
/// The only error type that crosses the public entry points; module errors
/// convert into it.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// An LLM provider call failed where the caller could not degrade.
    #[error("inference failed: {0}")]
    Inference(String),

    /// A configuration value is missing or invalid.
    ///
    /// Returned at construction time so that misconfiguration surfaces
    /// immediately rather than at the first query.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// `reason` was called before a successful `init`.
    #[error("orchestrator is not initialized; call init() first")]
    NotInitialized,

    /// Trace storage failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Catch-all for errors that do not fit a specific variant.
    #[error("{0}")]
    Other(String),
}

impl From<ConfigError> for OrchestratorError {
    fn from(e: ConfigError) -> Self {
        OrchestratorError::ConfigError(e.to_string())
    }
}

impl From<ProviderError> for OrchestratorError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::MissingCredentials(_) => OrchestratorError::ConfigError(e.to_string()),
            other => OrchestratorError::Inference(other.to_string()),
        }
    }
}

impl From<MemoryError> for OrchestratorError {
    fn from(e: MemoryError) -> Self {
        OrchestratorError::Storage(e.to_string())
    }
}

impl From<EvolutionError> for OrchestratorError {
    fn from(e: EvolutionError) -> Self {
        OrchestratorError::Other(e.to_string())
    }
}

impl From<intelligence::TemplateError> for OrchestratorError {
    fn from(e: intelligence::TemplateError) -> Self {
        OrchestratorError::Other(e.to_string())
    }
}
