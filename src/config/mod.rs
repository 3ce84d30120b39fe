//! # Stage: Reasoner Configuration
//!
//! ## Responsibility
//! Describe everything a [`crate::pipeline::Reasoner`] needs: which provider
//! and models to call, how long to wait and how often to retry, whether to
//! remember traces and when to reuse them, and how eagerly to evolve prompt
//! templates. Parsed from TOML by [`loader`] and checked by [`validation`].
//!
//! ## Guarantees
//! - Total defaults: an empty TOML document is a valid configuration
//!   (deterministic provider, memory off)
//! - Validated: [`loader`] never returns a config that fails [`validation`]
//! - Schema-exportable: [`config_json_schema`] enables IDE autocomplete
//!
//! ## NOT Responsible For
//! - Building providers (that belongs to `provider::build_provider`)
//! - Opening the trace store (that belongs to `memory`)

pub mod loader;
pub mod validation;

use crate::provider::ProviderKind;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use loader::{load_from_file, load_from_str};
pub use validation::{validate, ConfigError};

// ── Default value functions ──────────────────────────────────────────────

fn default_provider() -> ProviderKind {
    ProviderKind::Mock
}

fn default_main_model() -> String {
    "gpt-4o".to_string()
}

fn default_logical_weight() -> f64 {
    0.4
}

fn default_rule_weight() -> f64 {
    0.4
}

fn default_empathy_weight() -> f64 {
    0.2
}

fn default_memory_path() -> String {
    "./data/memory.db".to_string()
}

fn default_capacity() -> usize {
    1000
}

fn default_similarity_threshold() -> f64 {
    0.9
}

fn default_min_accuracy() -> f64 {
    0.85
}

fn default_min_confidence() -> f64 {
    0.8
}

fn default_freshness_ms() -> u64 {
    2000
}

fn default_max_retries() -> usize {
    3
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_retry_backoff_ms() -> u64 {
    100
}

fn default_alpha() -> f64 {
    0.4
}

fn default_beta() -> f64 {
    0.3
}

fn default_gamma() -> f64 {
    0.001
}

fn default_theta() -> f64 {
    0.1
}

fn default_window() -> usize {
    10
}

// ── Top-level config ─────────────────────────────────────────────────────

/// Root configuration for a reasoner.
///
/// # Example
///
/// ```toml
/// provider = "anthropic"
/// credentials = "sk-..."
/// main_model = "claude-3-5-sonnet-latest"
/// simple_model = "claude-3-5-haiku-latest"
///
/// [memory]
/// enabled = true
/// path = "./data/memory.db"
///
/// [performance]
/// max_retries = 2
/// timeout_ms = 20000
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ReasonerConfig {
    /// Provider backend.
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,
    /// API key for network providers. Ignored by `mock`.
    #[serde(default)]
    pub credentials: String,
    /// Model used for planning and solving at depth below 3.
    #[serde(default = "default_main_model")]
    pub main_model: String,
    /// Model for quick answers, the critic and repair. Falls back to `main_model`.
    #[serde(default)]
    pub simple_model: Option<String>,
    /// Model for planning and solving at depth 3. Falls back to `main_model`.
    #[serde(default)]
    pub complex_model: Option<String>,
    /// Reasoning weights.
    #[serde(default)]
    pub weights: WeightsConfig,
    /// Trace memory and cache.
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Retries and timeouts.
    #[serde(default)]
    pub performance: PerformanceConfig,
    /// Template learner.
    #[serde(default)]
    pub evolution: EvolutionConfig,
    /// Prompt seed library.
    #[serde(default)]
    pub prompts: PromptsConfig,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            credentials: String::new(),
            main_model: default_main_model(),
            simple_model: None,
            complex_model: None,
            weights: WeightsConfig::default(),
            memory: MemoryConfig::default(),
            performance: PerformanceConfig::default(),
            evolution: EvolutionConfig::default(),
            prompts: PromptsConfig::default(),
        }
    }
}

impl ReasonerConfig {
    /// Model for quick answers, the critic and repair.
    pub fn simple_model(&self) -> &str {
        self.simple_model.as_deref().unwrap_or(&self.main_model)
    }

    /// Model for planning and solving at `required_depth`.
    pub fn depth_model(&self, required_depth: u8) -> &str {
        if required_depth >= 3 {
            self.complex_model.as_deref().unwrap_or(&self.main_model)
        } else {
            &self.main_model
        }
    }

    /// Per-call provider timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.performance.timeout_ms)
    }
}

// ── Sections ─────────────────────────────────────────────────────────────

/// Relative weights of logical, rule-based and empathetic reasoning.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct WeightsConfig {
    /// Logical weight.
    #[serde(default = "default_logical_weight")]
    pub logical: f64,
    /// Rule weight.
    #[serde(default = "default_rule_weight")]
    pub rule: f64,
    /// Empathy weight.
    #[serde(default = "default_empathy_weight")]
    pub empathy: f64,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            logical: default_logical_weight(),
            rule: default_rule_weight(),
            empathy: default_empathy_weight(),
        }
    }
}

/// Trace memory and cache thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct MemoryConfig {
    /// Whether traces are stored and the cache consulted.
    #[serde(default)]
    pub enabled: bool,
    /// SQLite database path.
    #[serde(default = "default_memory_path")]
    pub path: String,
    /// Maximum traces kept in the working set.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Minimum fingerprint similarity for a cache hit.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    /// Minimum stored accuracy for a cache hit.
    #[serde(default = "default_min_accuracy")]
    pub min_accuracy: f64,
    /// Minimum stored confidence for a cache hit.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    /// A cached trace must be older than this.
    #[serde(default = "default_freshness_ms")]
    pub freshness_ms: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_memory_path(),
            capacity: default_capacity(),
            similarity_threshold: default_similarity_threshold(),
            min_accuracy: default_min_accuracy(),
            min_confidence: default_min_confidence(),
            freshness_ms: default_freshness_ms(),
        }
    }
}

/// Retries and timeouts.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct PerformanceConfig {
    /// Attempts per solver step and per quick answer.
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    /// Per-call provider timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Initial exponential backoff between attempts. `0` retries immediately.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            timeout_ms: default_timeout_ms(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// Sliding-window learner parameters.
///
/// A step fires when `alpha(1 - acc) + beta(1 - comp) + gamma * latency_ms`,
/// averaged over a full window, exceeds `theta`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct EvolutionConfig {
    /// Accuracy weight.
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    /// Compliance weight.
    #[serde(default = "default_beta")]
    pub beta: f64,
    /// Latency weight, per millisecond.
    #[serde(default = "default_gamma")]
    pub gamma: f64,
    /// Firing threshold.
    #[serde(default = "default_theta")]
    pub theta: f64,
    /// Samples per window.
    #[serde(default = "default_window")]
    pub window: usize,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            beta: default_beta(),
            gamma: default_gamma(),
            theta: default_theta(),
            window: default_window(),
        }
    }
}

/// Prompt seed library.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct PromptsConfig {
    /// JSON file of prompt seeds. `None` uses only the built-in templates.
    #[serde(default)]
    pub seeds_path: Option<String>,
}

/// Export the JSON Schema for [`ReasonerConfig`].
///
/// # Errors
///
/// Returns `serde_json::Error` if schema serialization fails.
///
/// # Panics
///
/// This function never panics.
pub fn config_json_schema() -> Result<String, serde_json::Error> {
    let schema = schemars::schema_for!(ReasonerConfig);
    serde_json::to_string_pretty(&schema)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = ReasonerConfig::default();
        assert_eq!(config.provider, ProviderKind::Mock);
        assert_eq!(config.weights, WeightsConfig { logical: 0.4, rule: 0.4, empathy: 0.2 });
        assert!(!config.memory.enabled);
        assert_eq!(config.memory.path, "./data/memory.db");
        assert_eq!(config.memory.capacity, 1000);
        assert_eq!(config.performance.max_retries, 3);
        assert_eq!(config.performance.timeout_ms, 30_000);
        assert_eq!(config.evolution.window, 10);
    }

    #[test]
    fn test_model_selection_falls_back_to_main() {
        let mut config = ReasonerConfig {
            main_model: "main".into(),
            ..ReasonerConfig::default()
        };
        assert_eq!(config.simple_model(), "main");
        assert_eq!(config.depth_model(3), "main");

        config.simple_model = Some("small".into());
        config.complex_model = Some("large".into());
        assert_eq!(config.simple_model(), "small");
        assert_eq!(config.depth_model(2), "main");
        assert_eq!(config.depth_model(3), "large");
    }

    #[test]
    fn test_provider_kind_deserializes_openai_alias() {
        let kind: ProviderKind = serde_json::from_str("\"openai\"").expect("test: deserialization");
        assert_eq!(kind, ProviderKind::OpenAi);
    }

    #[test]
    fn test_config_json_schema_produces_valid_json() {
        let schema = config_json_schema().expect("test: schema export");
        let parsed: serde_json::Value =
            serde_json::from_str(&schema).expect("test: schema is valid JSON");
        assert!(parsed.get("properties").is_some() || parsed.get("$ref").is_some());
    }
}
