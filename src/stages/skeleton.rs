//! Skeleton planning.
//!
//! One provider call asks for a JSON plan `{claim, substeps, expectedChecks}`.
//! Parsing is an explicit [`Result`]; any failure (provider error, malformed
//! JSON, no usable substeps) yields the deterministic fallback plan sized by
//! the required depth.

use super::{markers, ProviderCall};
use crate::metrics;
use crate::routing::Classification;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Upper bound on parsed substeps.
pub const MAX_SUBSTEPS: usize = 6;

const DEFAULT_SUBSTEPS: [&str; 5] = [
    "Restate the question and key variables",
    "Identify governing constraints or assumptions",
    "Apply the relevant method or principle",
    "Validate the result against the constraints",
    "State the conclusion",
];

const FALLBACK_CHECKS: [&str; 3] = [
    "No contradictions",
    "All constraints satisfied",
    "Result matches query requirements",
];

const MINIMAL_CHECKS: [&str; 2] = ["No contradictions", "Final answer stated"];

/// The plan the solver executes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningSkeleton {
    /// What the reasoning sets out to establish.
    pub claim: String,
    /// Ordered imperative instructions, one per solved step.
    pub substeps: Vec<String>,
    /// Checks the verifier looks for in the solved text.
    pub expected_checks: Vec<String>,
}

impl ReasoningSkeleton {
    /// Deterministic plan used when planning fails: 3, 4 or 5 generic
    /// substeps for depth 1, 2 or 3.
    pub fn fallback(query: &str, required_depth: u8) -> Self {
        let count = match required_depth {
            0 | 1 => 3,
            2 => 4,
            _ => 5,
        };
        // The conclusion step always closes the plan.
        let mut substeps: Vec<String> = DEFAULT_SUBSTEPS[..count - 1]
            .iter()
            .map(|s| s.to_string())
            .collect();
        substeps.push(DEFAULT_SUBSTEPS[4].to_string());
        Self {
            claim: format!("Resolve: {query}"),
            substeps,
            expected_checks: FALLBACK_CHECKS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Why a planner response could not be used.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SkeletonParseError {
    /// No JSON object could be located in the response.
    #[error("no JSON object found in planner response")]
    NoJson,
    /// The located text is not valid JSON for a plan.
    #[error("invalid planner JSON: {0}")]
    InvalidJson(String),
    /// The plan carried no non-empty substeps.
    #[error("planner returned no substeps")]
    NoSubsteps,
}

#[derive(Debug, Deserialize)]
struct RawPlan {
    #[serde(default)]
    claim: Option<String>,
    #[serde(default)]
    substeps: Vec<serde_json::Value>,
    #[serde(default, rename = "expectedChecks", alias = "expected_checks")]
    expected_checks: Vec<serde_json::Value>,
}

fn trimmed_strings(values: Vec<serde_json::Value>) -> Vec<String> {
    values
        .into_iter()
        .filter_map(|v| match v {
            serde_json::Value::String(s) => Some(s.trim().to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .collect()
}

/// Locate the JSON payload: a ```json fence if present, else the outermost
/// `{...}` span.
fn extract_json(raw: &str) -> Option<&str> {
    let body = match raw.to_ascii_lowercase().find("```json") {
        Some(open) => {
            let rest = &raw[open + "```json".len()..];
            rest.find("```").map_or(rest, |close| &rest[..close])
        }
        None => raw,
    };
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    (end > start).then(|| &body[start..=end])
}

/// Parse a planner response.
///
/// `claim` falls back to `Resolve: {query}` when absent; empty checks become
/// `[No contradictions, Final answer stated]`; substeps are truncated to
/// [`MAX_SUBSTEPS`].
///
/// # Errors
///
/// [`SkeletonParseError`] when no usable plan is present.
pub fn parse_skeleton(raw: &str, query: &str) -> Result<ReasoningSkeleton, SkeletonParseError> {
    let json = extract_json(raw).ok_or(SkeletonParseError::NoJson)?;
    let plan: RawPlan =
        serde_json::from_str(json).map_err(|e| SkeletonParseError::InvalidJson(e.to_string()))?;

    let mut substeps = trimmed_strings(plan.substeps);
    if substeps.is_empty() {
        return Err(SkeletonParseError::NoSubsteps);
    }
    substeps.truncate(MAX_SUBSTEPS);

    let mut expected_checks = trimmed_strings(plan.expected_checks);
    if expected_checks.is_empty() {
        expected_checks = MINIMAL_CHECKS.iter().map(|s| s.to_string()).collect();
    }

    let claim = plan
        .claim
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| format!("Resolve: {query}"));

    Ok(ReasoningSkeleton {
        claim,
        substeps,
        expected_checks,
    })
}

fn planning_prompt(query: &str, classification: &Classification, context: Option<&str>) -> String {
    let context_line = context
        .filter(|c| !c.is_empty())
        .map(|c| format!("- context: {c}\n"))
        .unwrap_or_default();
    format!(
        "{plan} Your job is to produce a concise reasoning skeleton in JSON.\n\
         Return an object with keys claim, substeps (array of 3-6 imperative steps), expectedChecks (array).\n\
         Do NOT provide any reasoning details.\n\n\
         Problem:\n{query}\n\n\
         Classification:\n\
         - type: {kind}\n\
         - difficulty: {difficulty}\n\
         - depth: {depth}\n\
         - domain: {domain}\n\
         {context_line}\n\
         Respond ONLY with JSON.",
        plan = markers::PLAN,
        kind = classification.query_type,
        difficulty = classification.difficulty,
        depth = classification.required_depth,
        domain = classification.domain,
    )
}

/// Ask the provider for a plan, falling back to the deterministic skeleton.
///
/// # Panics
///
/// This function never panics.
pub async fn generate_skeleton(
    call: &ProviderCall<'_>,
    query: &str,
    classification: &Classification,
    context: Option<&str>,
) -> ReasoningSkeleton {
    let prompt = planning_prompt(query, classification, context);
    let raw = match call.invoke(&prompt).await {
        Ok(raw) => raw,
        Err(e) => {
            metrics::inc_provider_error("skeleton");
            warn!(stage = "skeleton", error = %e, "planner call failed; using fallback plan");
            return ReasoningSkeleton::fallback(query, classification.required_depth);
        }
    };

    match parse_skeleton(&raw, query) {
        Ok(skeleton) => {
            debug!(stage = "skeleton", substeps = skeleton.substeps.len(), "plan parsed");
            skeleton
        }
        Err(e) => {
            warn!(stage = "skeleton", error = %e, "planner output unusable; using fallback plan");
            ReasoningSkeleton::fallback(query, classification.required_depth)
        }
    }
}
