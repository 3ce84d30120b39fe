//! Formal-schema selection.
//!
//! Exactly one schema is chosen per run by a priority-ordered rule table; the
//! skeleton it produces is audit metadata, not a proof obligation.

use super::decompose::Decomposition;
use super::detector::{ProblemStructure, StructureKind};
use crate::patterns::Pattern;
use serde::{Deserialize, Serialize};
use std::fmt;

static NUMBER_DOMAIN: Pattern = Pattern::new(r"integer|natural");

/// Formal system used to frame the derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormalSchema {
    /// Zermelo-Fraenkel set theory (default).
    Zf,
    /// Hilbert-style axiomatic deduction.
    Hilbert,
    /// Hoare triples.
    Hoare,
    /// Peano arithmetic / induction.
    Peano,
    /// Lagrangian optimisation.
    Lagrange,
    /// Natural deduction.
    NaturalDeduction,
}

impl FormalSchema {
    /// Stable snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FormalSchema::Zf => "zf",
            FormalSchema::Hilbert => "hilbert",
            FormalSchema::Hoare => "hoare",
            FormalSchema::Peano => "peano",
            FormalSchema::Lagrange => "lagrange",
            FormalSchema::NaturalDeduction => "natural_deduction",
        }
    }
}

impl fmt::Display for FormalSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schema-specific framing of a decomposition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormalSkeleton {
    /// Chosen schema.
    pub schema: FormalSchema,
    /// Assumptions the derivation starts from.
    pub assumptions: Vec<String>,
    /// Derivation lines.
    pub derivation: Vec<String>,
    /// Schema-level checks.
    pub checks: Vec<String>,
    /// Expected conclusion form.
    pub conclusion: String,
}

/// Pick the schema for a structure and its decomposition.
///
/// Priority: symmetric inequality → hilbert; diophantine or proof over
/// integers/naturals → peano; eigenvalue or inequality → lagrange; causal
/// loop or counterfactual → hoare; paradox → natural deduction; else zf.
pub fn select_schema(structure: &ProblemStructure, decomposition: &Decomposition) -> FormalSchema {
    let kind = structure.kind;
    if kind == StructureKind::Inequality && structure.has_symmetry {
        FormalSchema::Hilbert
    } else if kind == StructureKind::Diophantine
        || (structure.requires_proof && NUMBER_DOMAIN.is_match(&decomposition.steps.join(" ")))
    {
        FormalSchema::Peano
    } else if matches!(kind, StructureKind::Eigenvalue | StructureKind::Inequality) {
        FormalSchema::Lagrange
    } else if kind == StructureKind::CausalLoop || structure.requires_counterfactual {
        FormalSchema::Hoare
    } else if kind == StructureKind::Paradox {
        FormalSchema::NaturalDeduction
    } else {
        FormalSchema::Zf
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Build the formal skeleton for a structure and its decomposition.
///
/// # Panics
///
/// This function never panics.
pub fn formal_skeleton(structure: &ProblemStructure, decomposition: &Decomposition) -> FormalSkeleton {
    let schema = select_schema(structure, decomposition);
    let steps = &decomposition.steps;
    let constraints = decomposition.constraints.clone();

    let (assumptions, derivation, checks, conclusion) = match schema {
        FormalSchema::Hilbert => (
            constraints,
            steps
                .iter()
                .enumerate()
                .map(|(i, s)| format!("Axiom {}: {s}", i + 1))
                .collect(),
            strings(&["Deduction rules applied correctly", "No circular reasoning"]),
            "Theorem proved via deductive steps",
        ),
        FormalSchema::Peano => {
            let mut derivation = strings(&[
                "Base case: Verify for n=0 or n=1",
                "Inductive step: Assume P(k), prove P(k+1)",
            ]);
            derivation.extend(steps.iter().cloned());
            (
                strings(&["Base case defined", "Inductive hypothesis stated"]),
                derivation,
                strings(&["Base case verified", "Inductive step valid"]),
                "Statement holds for all natural numbers",
            )
        }
        FormalSchema::Lagrange => (
            constraints,
            strings(&[
                "Define objective function and constraints",
                "Construct Lagrangian",
                "Compute gradients and set to zero",
                "Solve for critical points",
                "Verify optimality conditions",
            ]),
            strings(&["Constraints satisfied", "KKT conditions hold", "Solution is global"]),
            "Optimal solution derived",
        ),
        FormalSchema::Hoare => (
            vec![format!("Precondition: {}", constraints.join(", "))],
            steps.iter().map(|s| format!("{{P}} {s} {{Q}}")).collect(),
            strings(&["Precondition holds", "Postcondition derived", "No side effects"]),
            "Postcondition satisfied",
        ),
        FormalSchema::NaturalDeduction => (
            constraints,
            steps.clone(),
            strings(&["All inference rules valid", "No assumptions violated"]),
            "Conclusion follows from premises",
        ),
        FormalSchema::Zf => (
            constraints,
            steps.clone(),
            strings(&[
                "No contradictions",
                "All axioms satisfied",
                "Boundary conditions checked",
            ]),
            "Final statement follows from axioms",
        ),
    };

    FormalSkeleton {
        schema,
        assumptions,
        derivation,
        checks,
        conclusion: conclusion.to_string(),
    }
}
