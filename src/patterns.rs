//! Lazily compiled, process-wide regex patterns.
//!
//! Every heuristic stage matches text against fixed pattern tables. A
//! [`Pattern`] compiles its regex on first use and caches it; a pattern that
//! fails to compile is logged once and then behaves as "never matches", so a
//! bad table entry degrades a heuristic instead of aborting a run.

use regex::Regex;
use std::sync::OnceLock;

/// A regex compiled on first use.
pub(crate) struct Pattern {
    source: &'static str,
    compiled: OnceLock<Option<Regex>>,
}

impl Pattern {
    /// Declare a pattern; nothing is compiled until the first match.
    pub(crate) const fn new(source: &'static str) -> Self {
        Self {
            source,
            compiled: OnceLock::new(),
        }
    }

    /// The compiled regex, or `None` if the source is invalid.
    pub(crate) fn regex(&self) -> Option<&Regex> {
        self.compiled
            .get_or_init(|| match Regex::new(self.source) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!(pattern = self.source, error = %e, "pattern failed to compile");
                    None
                }
            })
            .as_ref()
    }

    /// Whether the pattern matches anywhere in `text`.
    pub(crate) fn is_match(&self, text: &str) -> bool {
        self.regex().is_some_and(|re| re.is_match(text))
    }

    /// Number of non-overlapping matches in `text`.
    pub(crate) fn count(&self, text: &str) -> usize {
        self.regex().map_or(0, |re| re.find_iter(text).count())
    }
}

/// Whether any of `patterns` matches `text`.
pub(crate) fn any_match(patterns: &[Pattern], text: &str) -> bool {
    patterns.iter().any(|p| p.is_match(text))
}
