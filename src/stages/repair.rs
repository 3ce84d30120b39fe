//! Single bounded repair pass.
//!
//! Findings from the math validator, the logic validator and a failed
//! verification become [`RepairInstruction`]s; one provider call asks for a
//! corrected version of the reasoning. The answer is accepted only when its
//! length stays within `(0.5x, 2x)` of the original, and is then reshaped to
//! the skeleton's step count.

use super::{
    fallback_step_content, markers, LogicVerification, MathVerification, ProviderCall,
    ReasoningSkeleton, SolvedStep, VerificationResult,
};
use crate::metrics;
use crate::patterns::Pattern;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Longest the repair call may take.
pub const REPAIR_TIMEOUT_CAP: Duration = Duration::from_secs(20);

static PARAGRAPH_BREAK: Pattern = Pattern::new(r"\n\s*\n");
static STEP_LABEL: Pattern = Pattern::new(r"(?i)^step \d+:\s*");

/// One thing the repair pass must fix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairInstruction {
    /// 1-based step, or 0 for the reasoning as a whole.
    pub step: usize,
    /// What is wrong.
    pub issue: String,
    /// How to fix it.
    pub suggestion: String,
}

/// Result of the repair pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairOutcome {
    /// Whether the repaired text was accepted.
    pub success: bool,
    /// Instructions addressed by an accepted repair; 0 otherwise.
    pub changes: usize,
    /// Replacement steps, normalised to the skeleton length, when accepted.
    pub steps: Option<Vec<SolvedStep>>,
}

/// Gather instructions from every finding source, in the order math, logic,
/// verifier suggestions.
pub fn collect_repair_instructions(
    math: &MathVerification,
    logic: &LogicVerification,
    verification: &VerificationResult,
) -> Vec<RepairInstruction> {
    let mut instructions = Vec::new();
    if !math.passed {
        instructions.push(RepairInstruction {
            step: 0,
            issue: "Math verification failed".to_string(),
            suggestion: math.details.clone(),
        });
    }
    if !logic.consistent {
        instructions.push(RepairInstruction {
            step: 0,
            issue: "Logic inconsistency".to_string(),
            suggestion: logic.details.clone(),
        });
    }
    if !verification.passed {
        instructions.extend(verification.suggestions.iter().enumerate().map(|(i, s)| {
            RepairInstruction {
                step: i + 1,
                issue: "Verification failure".to_string(),
                suggestion: s.clone(),
            }
        }));
    }
    instructions
}

fn repair_prompt(original: &str, instructions: &[RepairInstruction]) -> String {
    let issues = instructions
        .iter()
        .map(|i| format!("Step {}: {} → {}", i.step, i.issue, i.suggestion))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "{repair} Fix them precisely without rewriting unrelated parts.\n\n\
         {original_header}{original}{issues_header}\n{issues}\n\n\
         Provide the corrected reasoning with the same structure.",
        repair = markers::REPAIR,
        original_header = markers::REPAIR_ORIGINAL,
        issues_header = markers::REPAIR_ISSUES,
    )
}

/// Whether a repaired text is an acceptable replacement for `original`.
pub fn accept_repair(original: &str, repaired: &str) -> bool {
    let original = original.len() as f64;
    let repaired = repaired.len() as f64;
    repaired > original * 0.5 && repaired < original * 2.0
}

/// Reshape repaired paragraphs to exactly one step per substep.
///
/// Leading `Step N:` labels are stripped. Missing steps are backfilled with
/// the fallback sentence for their instruction; surplus paragraphs are folded
/// into the last step.
pub fn normalize_step_count(repaired: &str, skeleton: &ReasoningSkeleton) -> Vec<SolvedStep> {
    let paragraphs: Vec<String> = match PARAGRAPH_BREAK.regex() {
        Some(re) => re.split(repaired).map(str::to_string).collect(),
        None => repaired.split("\n\n").map(str::to_string).collect(),
    };
    let mut paragraphs: Vec<String> = paragraphs
        .into_iter()
        .map(|p| {
            let trimmed = p.trim();
            STEP_LABEL
                .regex()
                .map_or(trimmed.to_string(), |re| re.replace(trimmed, "").into_owned())
        })
        .filter(|p| !p.is_empty())
        .collect();

    let wanted = skeleton.substeps.len();
    if wanted > 0 && paragraphs.len() > wanted {
        let surplus = paragraphs.split_off(wanted - 1);
        paragraphs.push(surplus.join("\n\n"));
    }
    while paragraphs.len() < wanted {
        let instruction = &skeleton.substeps[paragraphs.len()];
        paragraphs.push(fallback_step_content(instruction));
    }

    paragraphs
        .into_iter()
        .enumerate()
        .map(|(i, content)| SolvedStep::new(i + 1, content))
        .collect()
}

/// Run the repair pass over `steps`.
///
/// `call` should target the simple model; its timeout is capped at
/// [`REPAIR_TIMEOUT_CAP`]. Rejection and provider failure both keep the
/// original steps (`steps: None`).
///
/// # Panics
///
/// This function never panics.
pub async fn repair_reasoning(
    call: &ProviderCall<'_>,
    steps: &[SolvedStep],
    skeleton: &ReasoningSkeleton,
    instructions: &[RepairInstruction],
) -> RepairOutcome {
    if instructions.is_empty() {
        return RepairOutcome {
            success: true,
            changes: 0,
            steps: None,
        };
    }

    let original = steps
        .iter()
        .map(|s| s.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    let prompt = repair_prompt(&original, instructions);

    let outcome = match call.capped(REPAIR_TIMEOUT_CAP).invoke(&prompt).await {
        Ok(fixed) if accept_repair(&original, &fixed) => RepairOutcome {
            success: true,
            changes: instructions.len(),
            steps: Some(normalize_step_count(&fixed, skeleton)),
        },
        Ok(fixed) => {
            warn!(
                stage = "repair",
                original_len = original.len(),
                repaired_len = fixed.len(),
                "repair rejected: length out of bounds"
            );
            RepairOutcome {
                success: false,
                changes: 0,
                steps: None,
            }
        }
        Err(e) => {
            metrics::inc_provider_error("repair");
            warn!(stage = "repair", error = %e, "repair call failed; keeping original steps");
            RepairOutcome {
                success: false,
                changes: 0,
                steps: None,
            }
        }
    };
    metrics::record_repair(outcome.success);
    info!(
        stage = "repair",
        success = outcome.success,
        instructions = instructions.len(),
        "repair pass finished"
    );
    outcome
}
