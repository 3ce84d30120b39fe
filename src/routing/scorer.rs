//! Query complexity scoring.
//!
//! Produces a continuous complexity score in `0.0..=1.0` that is reported with
//! every reasoning result. It does not drive the depth decision (that is the
//! classifier's difficulty ladder); it is an additional calibrated signal.
//!
//! ## Heuristics
//!
//! 1. **Length**: `min(tokens / 50, 1) * 0.3`
//! 2. **Explanatory keywords**: each why/how/explain/analyze occurrence → +0.1
//! 3. **Proof keywords**: each prove/demonstrate/justify occurrence → +0.15
//! 4. **Structure punctuation**: each `;`, `:` or `,` → +0.05
//!
//! The raw sum is capped at `1.0`.

use crate::patterns::Pattern;

static EXPLANATORY: Pattern = Pattern::new(r"(?i)why|how|explain|analyze");
static PROOF: Pattern = Pattern::new(r"(?i)prove|demonstrate|justify");
static STRUCTURE: Pattern = Pattern::new(r"[;:,]");

/// Per-signal contributions to a complexity score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    /// Length contribution.
    pub length: f64,
    /// Explanatory and proof keyword contribution.
    pub keywords: f64,
    /// Punctuation structure contribution.
    pub structure: f64,
    /// Capped total.
    pub total: f64,
}

/// Estimate the complexity of a query.
///
/// # Returns
///
/// A `f64` in `[0.0, 1.0]`.
///
/// # Panics
///
/// This function never panics.
///
/// # Example
///
/// ```rust
/// use reason_orchestrator::routing::estimate_complexity;
/// assert!(estimate_complexity("2 + 2") < 0.1);
/// ```
pub fn estimate_complexity(query: &str) -> f64 {
    breakdown(query).total
}

/// Break a complexity score down into its signals.
///
/// # Panics
///
/// This function never panics.
pub fn breakdown(query: &str) -> ScoreBreakdown {
    let tokens = query.split_whitespace().count() as f64;
    let length = (tokens / 50.0).min(1.0) * 0.3;
    let keywords = EXPLANATORY.count(query) as f64 * 0.1 + PROOF.count(query) as f64 * 0.15;
    let structure = STRUCTURE.count(query) as f64 * 0.05;

    ScoreBreakdown {
        length,
        keywords,
        structure,
        total: (length + keywords + structure).min(1.0),
    }
}
