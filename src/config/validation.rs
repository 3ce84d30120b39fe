//! Configuration validation engine.
//!
//! ## Responsibility
//! Validate semantic constraints on a parsed [`ReasonerConfig`] that the type
//! system cannot express: ranges, non-empty strings and cross-field rules
//! such as "network providers need credentials".
//!
//! ## Guarantees
//! - Every validation rule has at least one test that triggers it
//! - Validation collects *all* errors before returning (no short-circuit)
//! - Error messages include the field path and the invalid value
//!
//! ## NOT Responsible For
//! - Parsing TOML (that belongs to `loader`)
//! - File I/O (that belongs to `loader`)

use super::ReasonerConfig;

/// Errors arising from configuration parsing, validation, or I/O.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parsing failed.
    #[error("Parse error in {file}: {source}")]
    Parse {
        /// Path of the file that failed to parse.
        file: String,
        /// Underlying TOML deserialization error.
        #[source]
        source: toml::de::Error,
    },

    /// One or more semantic validation rules failed.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A specific field has an out-of-range or contradictory value.
    #[error("Field '{field}' has invalid value {value}: {reason}")]
    InvalidField {
        /// Dot-separated field path (e.g., "memory.capacity").
        field: String,
        /// String representation of the invalid value.
        value: String,
        /// Human-readable explanation of the constraint.
        reason: String,
    },

    /// File I/O error.
    #[error("IO error reading {file}: {source}")]
    Io {
        /// Path of the file that could not be read.
        file: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Fold a list of violations into one [`ConfigError::Validation`].
pub fn summarize(errors: &[ConfigError]) -> ConfigError {
    ConfigError::Validation(
        errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; "),
    )
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidField {
        field: field.into(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn check_unit(errors: &mut Vec<ConfigError>, field: &str, value: f64) {
    if !(0.0..=1.0).contains(&value) {
        errors.push(invalid(field, value, "must be between 0.0 and 1.0"));
    }
}

/// Validate all semantic constraints on a [`ReasonerConfig`].
///
/// # Returns
///
/// - `Ok(())` if all constraints pass.
/// - `Err(Vec<ConfigError>)` with every violation found.
///
/// # Panics
///
/// This function never panics.
pub fn validate(config: &ReasonerConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    // ── Provider ─────────────────────────────────────────────────────
    if config.provider.requires_credentials() && config.credentials.trim().is_empty() {
        errors.push(invalid(
            "credentials",
            "\"\"",
            &format!("provider {} requires credentials", config.provider),
        ));
    }

    if config.main_model.trim().is_empty() {
        errors.push(invalid("main_model", "\"\"", "model name must not be empty"));
    }
    for (field, model) in [
        ("simple_model", &config.simple_model),
        ("complex_model", &config.complex_model),
    ] {
        if model.as_deref().is_some_and(|m| m.trim().is_empty()) {
            errors.push(invalid(field, "\"\"", "model name must not be empty when set"));
        }
    }

    // ── Weights ──────────────────────────────────────────────────────
    check_unit(&mut errors, "weights.logical", config.weights.logical);
    check_unit(&mut errors, "weights.rule", config.weights.rule);
    check_unit(&mut errors, "weights.empathy", config.weights.empathy);

    // ── Memory ───────────────────────────────────────────────────────
    if config.memory.capacity == 0 {
        errors.push(invalid("memory.capacity", 0, "must be at least 1"));
    }
    if config.memory.enabled && config.memory.path.trim().is_empty() {
        errors.push(invalid(
            "memory.path",
            "\"\"",
            "path must not be empty when memory is enabled",
        ));
    }
    check_unit(
        &mut errors,
        "memory.similarity_threshold",
        config.memory.similarity_threshold,
    );
    check_unit(&mut errors, "memory.min_accuracy", config.memory.min_accuracy);
    check_unit(&mut errors, "memory.min_confidence", config.memory.min_confidence);

    // ── Performance ──────────────────────────────────────────────────
    if config.performance.max_retries == 0 {
        errors.push(invalid("performance.max_retries", 0, "must be at least 1"));
    }
    if config.performance.timeout_ms == 0 {
        errors.push(invalid("performance.timeout_ms", 0, "must be at least 1ms"));
    }

    // ── Evolution ────────────────────────────────────────────────────
    if config.evolution.window == 0 {
        errors.push(invalid("evolution.window", 0, "must be at least 1"));
    }
    for (field, value) in [
        ("evolution.alpha", config.evolution.alpha),
        ("evolution.beta", config.evolution.beta),
        ("evolution.gamma", config.evolution.gamma),
        ("evolution.theta", config.evolution.theta),
    ] {
        if !value.is_finite() || value < 0.0 {
            errors.push(invalid(field, value, "must be a non-negative number"));
        }
    }

    // ── Prompts ──────────────────────────────────────────────────────
    if config
        .prompts
        .seeds_path
        .as_deref()
        .is_some_and(|p| p.trim().is_empty())
    {
        errors.push(invalid("prompts.seeds_path", "\"\"", "path must not be empty when set"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
