//! Finalisation: verdict text, mode and calibrated confidence.

use super::{ReasoningSkeleton, SolvedStep, VerificationResult};
use crate::routing::{Classification, Mode};
use serde::{Deserialize, Serialize};

/// Lowest confidence the full pipeline reports.
pub const CONFIDENCE_FLOOR: f64 = 0.4;
/// Highest confidence the full pipeline reports.
pub const CONFIDENCE_CEILING: f64 = 0.98;

const CONFIDENCE_BONUS: f64 = 0.3;
const RETRY_PENALTY: f64 = 0.1;
const MAX_RETRY_PENALTY: f64 = 0.2;

/// Finalised reasoning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizedReasoning {
    /// Full report: class, difficulty, mode, steps, conclusion and checks.
    pub verdict: String,
    /// Always the mode of the required depth.
    pub mode: Mode,
    /// In `[CONFIDENCE_FLOOR, CONFIDENCE_CEILING]`.
    pub confidence: f64,
    /// Checks found in the final steps.
    pub passed_checks: Vec<String>,
    /// Checks missing from the final steps.
    pub failed_checks: Vec<String>,
}

/// `clamp(score + 0.3 - min(0.1 * retries, 0.2), 0.4, 0.98)`.
pub fn calibrated_confidence(score: f64, retries: u32) -> f64 {
    let penalty = (f64::from(retries) * RETRY_PENALTY).min(MAX_RETRY_PENALTY);
    (score + CONFIDENCE_BONUS - penalty).clamp(CONFIDENCE_FLOOR, CONFIDENCE_CEILING)
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "None".to_string()
    } else {
        items.join(", ")
    }
}

/// Build the final report.
pub fn finalize(
    classification: &Classification,
    skeleton: &ReasoningSkeleton,
    steps: &[SolvedStep],
    verification: &VerificationResult,
    retries: u32,
) -> FinalizedReasoning {
    let mode = classification.mode();
    let steps_text = steps
        .iter()
        .enumerate()
        .map(|(i, s)| format!("Step {}: {}", i + 1, s.content))
        .collect::<Vec<_>>()
        .join("\n\n");
    let conclusion = steps
        .last()
        .map(|s| s.content.as_str())
        .filter(|c| !c.is_empty())
        .unwrap_or(&skeleton.claim);

    let verdict = format!(
        "Problem Class: {class}\n\
         Difficulty: {difficulty}/5\n\
         Mode: {mode}\n\n\
         {steps_text}\n\n\
         Conclusion:\n{conclusion}\n\n\
         Checks:\n\
         Passed: {passed}\n\
         Failed: {failed}",
        class = classification.query_type.as_str().to_uppercase(),
        difficulty = classification.difficulty,
        passed = list_or_none(&verification.passed_checks),
        failed = list_or_none(&verification.failed_checks),
    );

    FinalizedReasoning {
        verdict,
        mode,
        confidence: calibrated_confidence(verification.score, retries),
        passed_checks: verification.passed_checks.clone(),
        failed_checks: verification.failed_checks.clone(),
    }
}
