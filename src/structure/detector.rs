//! Problem-shape detection.
//!
//! Scores the lowercased query against a fixed regex table per shape. The
//! shape with the most matching patterns wins; ties keep the earlier row.

use crate::patterns::{any_match, Pattern};
use crate::routing::Domain;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Recognised problem shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureKind {
    /// Integer equations.
    Diophantine,
    /// Inequalities and bounds.
    Inequality,
    /// Spectral and matrix problems.
    Eigenvalue,
    /// Self-reference and contradiction.
    Paradox,
    /// Sacrificial moral dilemmas.
    Trolley,
    /// Time loops and retro-causation.
    CausalLoop,
    /// Personal identity and copies.
    Identity,
    /// Nothing matched.
    General,
}

impl StructureKind {
    /// Stable snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            StructureKind::Diophantine => "diophantine",
            StructureKind::Inequality => "inequality",
            StructureKind::Eigenvalue => "eigenvalue",
            StructureKind::Paradox => "paradox",
            StructureKind::Trolley => "trolley",
            StructureKind::CausalLoop => "causal_loop",
            StructureKind::Identity => "identity",
            StructureKind::General => "general",
        }
    }
}

impl fmt::Display for StructureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detected shape plus the textual markers that shape downstream stages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProblemStructure {
    /// Winning shape.
    pub kind: StructureKind,
    /// Symmetry markers present.
    pub has_symmetry: bool,
    /// Constraint markers present.
    pub has_constraints: bool,
    /// Proof markers present.
    pub requires_proof: bool,
    /// Counterfactual markers present.
    pub requires_counterfactual: bool,
    /// `min(matches / 3, 1)`, or the 0.3 floor for [`StructureKind::General`].
    pub pattern_confidence: f64,
}

// ── Pattern tables ───────────────────────────────────────────────────────

static DIOPHANTINE: [Pattern; 3] = [
    Pattern::new(r"x\^?\d+.*=.*\d+"),
    Pattern::new(r"integer solutions?"),
    Pattern::new(r"x⁴|y⁴|z²"),
];
static INEQUALITY: [Pattern; 4] = [
    Pattern::new(r"≥|≤|>=|<="),
    Pattern::new(r"prove that.*≥"),
    Pattern::new(r"tr\("),
    Pattern::new(r"λ"),
];
static EIGENVALUE: [Pattern; 4] = [
    Pattern::new(r"eigenvalue"),
    Pattern::new(r"λ.*max"),
    Pattern::new(r"matrix"),
    Pattern::new(r"tr\("),
];
static PARADOX: [Pattern; 4] = [
    Pattern::new(r"paradox"),
    Pattern::new(r"contradict"),
    Pattern::new(r"impossible"),
    Pattern::new(r"self.*referenc"),
];
static TROLLEY: [Pattern; 4] = [
    Pattern::new(r"trolley"),
    Pattern::new(r"save.*person"),
    Pattern::new(r"moral.*worth"),
    Pattern::new(r"utilitarian"),
];
static CAUSAL_LOOP: [Pattern; 4] = [
    Pattern::new(r"cause.*never"),
    Pattern::new(r"message.*past"),
    Pattern::new(r"timeline"),
    Pattern::new(r"bootstrap"),
];
static IDENTITY: [Pattern; 4] = [
    Pattern::new(r"identity"),
    Pattern::new(r"original"),
    Pattern::new(r"copy"),
    Pattern::new(r"consciousness"),
];

static SYMMETRY_MARKERS: [Pattern; 4] = [
    Pattern::new(r"symmetric"),
    Pattern::new(r"a = b = c"),
    Pattern::new(r"invariant"),
    Pattern::new(r"permutation"),
];
static CONSTRAINT_MARKERS: [Pattern; 4] = [
    Pattern::new(r"constraint"),
    Pattern::new(r"satisf"),
    Pattern::new(r"subject to"),
    Pattern::new(r"given that"),
];
static PROOF_MARKERS: [Pattern; 4] = [
    Pattern::new(r"prove"),
    Pattern::new(r"show that"),
    Pattern::new(r"demonstrate"),
    Pattern::new(r"justify"),
];
static COUNTERFACTUAL_MARKERS: [Pattern; 4] = [
    Pattern::new(r"if.*would"),
    Pattern::new(r"suppose"),
    Pattern::new(r"what if"),
    Pattern::new(r"had.*not"),
];

fn shape_table() -> [(StructureKind, &'static [Pattern]); 7] {
    [
        (StructureKind::Diophantine, &DIOPHANTINE),
        (StructureKind::Inequality, &INEQUALITY),
        (StructureKind::Eigenvalue, &EIGENVALUE),
        (StructureKind::Paradox, &PARADOX),
        (StructureKind::Trolley, &TROLLEY),
        (StructureKind::CausalLoop, &CAUSAL_LOOP),
        (StructureKind::Identity, &IDENTITY),
    ]
}

/// Detect the problem shape of a query.
///
/// `domain` is the classifier's domain; detection itself is purely textual.
///
/// # Panics
///
/// This function never panics.
pub fn detect_structure(query: &str, domain: Domain) -> ProblemStructure {
    let norm = query.to_lowercase();
    let mut kind = StructureKind::General;
    let mut max_score = 0usize;

    for (candidate, patterns) in shape_table() {
        let score = patterns.iter().filter(|p| p.is_match(&norm)).count();
        if score > max_score {
            max_score = score;
            kind = candidate;
        }
    }

    let structure = ProblemStructure {
        kind,
        has_symmetry: any_match(&SYMMETRY_MARKERS, &norm),
        has_constraints: any_match(&CONSTRAINT_MARKERS, &norm),
        requires_proof: any_match(&PROOF_MARKERS, &norm),
        requires_counterfactual: any_match(&COUNTERFACTUAL_MARKERS, &norm),
        pattern_confidence: if max_score > 0 {
            (max_score as f64 / 3.0).min(1.0)
        } else {
            0.3
        },
    };

    debug!(
        domain = %domain,
        structure = %structure.kind,
        matches = max_score,
        "structure detected"
    );
    structure
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_general_when_nothing_matches() {
        let s = detect_structure("Is Socrates mortal?", Domain::Logic);
        assert_eq!(s.kind, StructureKind::General);
        assert!((s.pattern_confidence - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_symmetric_inequality() {
        let s = detect_structure(
            "Prove that for positive a, b, c the symmetric sum a + b + c >= 3",
            Domain::Math,
        );
        assert_eq!(s.kind, StructureKind::Inequality);
        assert!(s.has_symmetry);
        assert!(s.requires_proof);
    }

    #[test]
    fn test_diophantine() {
        let s = detect_structure("Find all integer solutions of x^4 + y^4 = 2z^2", Domain::Math);
        assert_eq!(s.kind, StructureKind::Diophantine);
        assert!((s.pattern_confidence - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_eigenvalue_beats_inequality_on_matrix_wording() {
        let s = detect_structure(
            "For a symmetric matrix A bound the largest eigenvalue using tr(A^2)",
            Domain::Math,
        );
        assert_eq!(s.kind, StructureKind::Eigenvalue);
    }

    #[test]
    fn test_trolley() {
        let s = detect_structure(
            "In the trolley problem, should you pull the lever to save the person?",
            Domain::Ethics,
        );
        assert_eq!(s.kind, StructureKind::Trolley);
    }

    #[test]
    fn test_counterfactual_and_constraint_markers() {
        let s = detect_structure(
            "Suppose the message reached the past, given that nothing changes",
            Domain::Causal,
        );
        assert_eq!(s.kind, StructureKind::CausalLoop);
        assert!(s.requires_counterfactual);
        assert!(s.has_constraints);
    }

    #[test]
    fn test_tie_keeps_table_order() {
        // "tr(" is in both the inequality and eigenvalue tables
        let s = detect_structure("compute tr(a)", Domain::Math);
        assert_eq!(s.kind, StructureKind::Inequality);
    }

    #[test]
    fn test_confidence_caps_at_one() {
        let s = detect_structure(
            "paradox: a self-referencing statement that is impossible and contradicts itself",
            Domain::Logic,
        );
        assert_eq!(s.kind, StructureKind::Paradox);
        assert_eq!(s.pattern_confidence, 1.0);
    }
}
