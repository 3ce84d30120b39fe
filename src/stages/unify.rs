//! Unification of solved steps.
//!
//! Drops every step that a later step negates, joins the survivors with blank
//! lines and scores how well consecutive steps hang together.

use crate::intelligence::similarity::bag_of_words_cosine;
use serde::{Deserialize, Serialize};

/// Unified reasoning text and its coherence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedReasoning {
    /// Surviving steps joined with blank lines.
    pub unified: String,
    /// Surviving steps, in order.
    pub steps: Vec<String>,
    /// Mean bag-of-words cosine between adjacent survivors; 1.0 for fewer
    /// than two.
    pub coherence: f64,
    /// Number of steps dropped as contradicted.
    pub removed: usize,
}

/// Whether `a` (lowercased) is negated by `b` (lowercased): `a` carries a
/// `not` and `b` contains `a` with its first `not` removed.
fn negates(a: &str, b: &str) -> bool {
    a.contains("not") && b.contains(a.replacen("not", "", 1).trim())
}

/// Drop contradicted steps, keeping order.
pub fn remove_contradictions(steps: &[String]) -> (Vec<String>, usize) {
    let lowered: Vec<String> = steps.iter().map(|s| s.to_lowercase()).collect();
    let mut kept = Vec::with_capacity(steps.len());
    let mut removed = 0;

    for (i, step) in steps.iter().enumerate() {
        let current = &lowered[i];
        let contradicted = lowered[i + 1..]
            .iter()
            .any(|later| negates(current, later) || negates(later, current));
        if contradicted {
            removed += 1;
        } else {
            kept.push(step.clone());
        }
    }
    (kept, removed)
}

/// Mean adjacent similarity.
pub fn coherence(steps: &[String]) -> f64 {
    if steps.len() < 2 {
        return 1.0;
    }
    let total: f64 = steps
        .windows(2)
        .map(|pair| bag_of_words_cosine(&pair[0], &pair[1]))
        .sum();
    total / (steps.len() - 1) as f64
}

/// Unify step contents.
pub fn unify(steps: &[String]) -> UnifiedReasoning {
    let (kept, removed) = remove_contradictions(steps);
    UnifiedReasoning {
        unified: kept.join("\n\n"),
        coherence: coherence(&kept),
        steps: kept,
        removed,
    }
}
