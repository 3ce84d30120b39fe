//! Template decomposition of a detected problem shape.

use super::detector::{ProblemStructure, StructureKind};
use serde::{Deserialize, Serialize};

const DIOPHANTINE_STEPS: [&str; 5] = [
    "Identify the equation structure and target variables",
    "Apply modular arithmetic constraints",
    "Use descent or lattice reduction",
    "Check trivial solutions",
    "Verify all solutions exhaustively",
];

const INEQUALITY_STEPS: [&str; 5] = [
    "State the inequality and boundary conditions",
    "Identify applicable theorems (Cauchy-Schwarz, AM-GM, Jensen)",
    "Apply algebraic manipulation",
    "Check equality conditions",
    "Conclude with rigorous justification",
];

const EIGENVALUE_STEPS: [&str; 5] = [
    "State the matrix properties and constraints",
    "Apply spectral decomposition",
    "Use trace and eigenvalue relationships",
    "Verify bounds numerically or symbolically",
    "State final inequality with proof",
];

const LOGIC_STEPS: [&str; 5] = [
    "Identify premises and logical operators",
    "Construct truth table or proof tree",
    "Apply inference rules (modus ponens, resolution)",
    "Check for contradictions",
    "State conclusion with justification",
];

const ETHICS_STEPS: [&str; 5] = [
    "Identify moral principles at stake",
    "Map consequences for each action",
    "Apply utilitarian, deontological, and virtue frameworks",
    "Weigh conflicting values",
    "Justify final recommendation",
];

const CAUSAL_STEPS: [&str; 5] = [
    "Identify causal variables and relationships",
    "Construct causal graph (DAG or cyclic)",
    "Check for confounders or feedback loops",
    "Apply counterfactual reasoning",
    "Conclude with causal mechanism",
];

const GENERAL_STEPS: [&str; 5] = [
    "Parse the question and identify key components",
    "Apply relevant domain knowledge",
    "Construct a logical argument",
    "Verify consistency",
    "State the conclusion",
];

/// A directed edge between two decomposition steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepEdge {
    /// Source step text.
    pub from: String,
    /// Target step text.
    pub to: String,
    /// Edge kind; decomposition only emits `"seq"`.
    pub kind: String,
}

/// Step template plus the constraints and invariants the reasoning must keep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decomposition {
    /// Ordered instruction strings.
    pub steps: Vec<String>,
    /// Constraints implied by textual markers.
    pub constraints: Vec<String>,
    /// Invariants implied by the shape.
    pub invariants: Vec<String>,
    /// Sequential edges between consecutive steps.
    pub graph: Vec<StepEdge>,
}

fn template_for(kind: StructureKind) -> &'static [&'static str; 5] {
    match kind {
        StructureKind::Diophantine => &DIOPHANTINE_STEPS,
        StructureKind::Inequality => &INEQUALITY_STEPS,
        StructureKind::Eigenvalue => &EIGENVALUE_STEPS,
        StructureKind::Paradox | StructureKind::CausalLoop => &LOGIC_STEPS,
        StructureKind::Trolley => &ETHICS_STEPS,
        StructureKind::Identity => &CAUSAL_STEPS,
        StructureKind::General => &GENERAL_STEPS,
    }
}

/// Expand a problem structure into its step template.
///
/// # Panics
///
/// This function never panics.
pub fn decompose(structure: &ProblemStructure) -> Decomposition {
    let steps: Vec<String> = template_for(structure.kind)
        .iter()
        .map(|s| s.to_string())
        .collect();

    let mut constraints = Vec::new();
    if structure.has_constraints {
        constraints.push("Respect all stated constraints".to_string());
    }
    if structure.has_symmetry {
        constraints.push("Preserve symmetry throughout reasoning".to_string());
    }
    if structure.requires_proof {
        constraints.push("Provide rigorous proof, not heuristics".to_string());
    }

    let mut invariants = Vec::new();
    if structure.has_symmetry {
        invariants.push("Symmetry preservation".to_string());
    }
    if structure.kind == StructureKind::Inequality {
        invariants.push("Inequality direction".to_string());
    }

    let graph = steps
        .windows(2)
        .map(|pair| StepEdge {
            from: pair[0].clone(),
            to: pair[1].clone(),
            kind: "seq".to_string(),
        })
        .collect();

    Decomposition {
        steps,
        constraints,
        invariants,
        graph,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn structure(kind: StructureKind) -> ProblemStructure {
        ProblemStructure {
            kind,
            has_symmetry: false,
            has_constraints: false,
            requires_proof: false,
            requires_counterfactual: false,
            pattern_confidence: 0.3,
        }
    }

    #[test]
    fn test_general_template() {
        let d = decompose(&structure(StructureKind::General));
        assert_eq!(d.steps.len(), 5);
        assert_eq!(d.steps[0], "Parse the question and identify key components");
        assert!(d.constraints.is_empty());
        assert!(d.invariants.is_empty());
    }

    #[test]
    fn test_shared_templates() {
        let paradox = decompose(&structure(StructureKind::Paradox));
        let causal_loop = decompose(&structure(StructureKind::CausalLoop));
        assert_eq!(paradox.steps, causal_loop.steps);
        let identity = decompose(&structure(StructureKind::Identity));
        assert_eq!(identity.steps[0], "Identify causal variables and relationships");
        let trolley = decompose(&structure(StructureKind::Trolley));
        assert_eq!(trolley.steps[4], "Justify final recommendation");
    }

    #[test]
    fn test_flags_append_constraints_and_invariants() {
        let mut s = structure(StructureKind::Inequality);
        s.has_symmetry = true;
        s.has_constraints = true;
        s.requires_proof = true;
        let d = decompose(&s);
        assert_eq!(
            d.constraints,
            vec![
                "Respect all stated constraints",
                "Preserve symmetry throughout reasoning",
                "Provide rigorous proof, not heuristics",
            ]
        );
        assert_eq!(d.invariants, vec!["Symmetry preservation", "Inequality direction"]);
    }

    #[test]
    fn test_graph_is_sequential_chain() {
        let d = decompose(&structure(StructureKind::Diophantine));
        assert_eq!(d.graph.len(), d.steps.len() - 1);
        for (i, edge) in d.graph.iter().enumerate() {
            assert_eq!(edge.from, d.steps[i]);
            assert_eq!(edge.to, d.steps[i + 1]);
            assert_eq!(edge.kind, "seq");
        }
    }
}
