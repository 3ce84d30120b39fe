//! TOML loading for [`ReasonerConfig`].
//!
//! Both entry points parse, then run [`validation::validate`], so a config
//! that comes back `Ok` is ready for `Reasoner::new`. Errors name the file
//! (or the caller-supplied source name) they came from.

use std::path::Path;

use super::validation::{self, ConfigError};
use super::ReasonerConfig;

/// Read, parse and validate a reasoner config file.
///
/// # Errors
///
/// [`ConfigError::Io`] when the file is unreadable, [`ConfigError::Parse`]
/// for malformed TOML or an unknown provider tag, and
/// [`ConfigError::Validation`] listing every rule the values break.
///
/// ```rust,ignore
/// let config = reason_orchestrator::config::load_from_file(Path::new("reasoner.toml"))?;
/// let reasoner = Reasoner::new(config).await?;
/// ```
pub fn load_from_file(path: &Path) -> Result<ReasonerConfig, ConfigError> {
    let file = path.display().to_string();
    match std::fs::read_to_string(path) {
        Ok(content) => load_from_str(&content, &file),
        Err(source) => Err(ConfigError::Io { file, source }),
    }
}

/// Parse and validate TOML held in memory; `source_name` stands in for the
/// file name in errors.
///
/// # Errors
///
/// As [`load_from_file`], minus the I/O case.
pub fn load_from_str(content: &str, source_name: &str) -> Result<ReasonerConfig, ConfigError> {
    let config: ReasonerConfig = toml::from_str(content).map_err(|source| ConfigError::Parse {
        file: source_name.to_string(),
        source,
    })?;
    validation::validate(&config).map_err(|errors| validation::summarize(&errors))?;
    Ok(config)
}
