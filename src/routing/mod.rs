//! # Stage: Query Routing
//!
//! ## Responsibility
//! Decide how much deliberation a query deserves: classify it into a problem
//! type, difficulty, domain and reasoning depth, flag trivially resolvable
//! queries for the quick path, and score its continuous complexity.
//!
//! ## Guarantees
//! - Deterministic: the same query always produces the same classification
//! - Total: every input, including empty strings, yields a classification
//! - Non-blocking: pure O(n) scans over the query, no I/O
//!
//! ## NOT Responsible For
//! - Calling providers (that belongs to `pipeline`)
//! - Problem-shape detection (that belongs to `structure`)

pub mod classifier;
pub mod scorer;

pub use classifier::{
    classify, detect_domain, is_short_arithmetic, Classification, Domain, Mode, QueryType,
};
pub use scorer::{estimate_complexity, ScoreBreakdown};
