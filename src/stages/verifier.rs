//! Verification of a solved skeleton.
//!
//! Three sources of findings feed one score:
//! - expected checks, matched by their first word against the solved text
//! - text heuristics (contradiction phrases, equality density, step parity)
//! - a critic pass on the simple model
//!
//! A critic failure is "no findings", never an error.

use super::{markers, ProviderCall, ReasoningSkeleton, SolvedStep};
use crate::metrics;
use crate::patterns::Pattern;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Longest the critic call may take.
pub const CRITIC_TIMEOUT_CAP: Duration = Duration::from_secs(15);

/// Score at or above which a finding-free verification passes.
pub const PASS_THRESHOLD: f64 = 0.65;

const EQUALITY_LIMIT: usize = 12;

static CONTRADICTION: Pattern = Pattern::new(
    r"but this contradicts|however, this contradicts|cannot be both|leads to contradiction",
);
static EQUALITY: Pattern = Pattern::new(r"=\s*[^=]+");

/// Outcome of one verification pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// `score >= 0.65` and no issues.
    pub passed: bool,
    /// Heuristic and critic findings.
    pub issues: Vec<String>,
    /// Expected checks found in the text.
    pub passed_checks: Vec<String>,
    /// Expected checks not found.
    pub failed_checks: Vec<String>,
    /// What a repair pass should address.
    pub suggestions: Vec<String>,
    /// In `[0, 1]`.
    pub score: f64,
}

/// Parsed critic response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CriticVerdict {
    /// The critic found nothing.
    Clean,
    /// One finding per line.
    Issues(Vec<String>),
}

impl CriticVerdict {
    /// Findings as a list; empty when clean.
    pub fn into_issues(self) -> Vec<String> {
        match self {
            CriticVerdict::Clean => Vec::new(),
            CriticVerdict::Issues(issues) => issues,
        }
    }
}

/// Parse a critic response: `OK` is clean, otherwise every non-empty line
/// with its `-`/`*` bullet stripped, excluding `OK` lines.
pub fn parse_critic(raw: &str) -> CriticVerdict {
    let issues: Vec<String> = raw
        .lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(['-', '*'])
                .trim_start()
                .to_string()
        })
        .filter(|line| !line.is_empty() && !line.eq_ignore_ascii_case("ok"))
        .collect();
    if issues.is_empty() {
        CriticVerdict::Clean
    } else {
        CriticVerdict::Issues(issues)
    }
}

fn joined_content(steps: &[SolvedStep]) -> String {
    steps
        .iter()
        .map(|s| s.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

fn critic_prompt(query: &str, skeleton: &ReasoningSkeleton, steps: &[SolvedStep]) -> String {
    let listed = steps
        .iter()
        .enumerate()
        .map(|(i, s)| format!("Step {}: {}", i + 1, s.content))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "{critic} Assess the reasoning below for the problem.\n\
         Problem: {query}\n\
         Skeleton claim: {claim}\n\
         Steps:\n{listed}\n\
         Checks: {checks}\n\n\
         List any critical issues in short bullet phrases. If none, respond with \"OK\".",
        critic = markers::CRITIC,
        claim = skeleton.claim,
        checks = skeleton.expected_checks.join(", "),
    )
}

/// Heuristic findings over the joined step text.
pub fn heuristic_issues(joined: &str, solved: usize, planned: usize) -> Vec<String> {
    let mut issues = Vec::new();
    if CONTRADICTION.is_match(&joined.to_lowercase()) {
        issues.push("Detected potential contradiction in reasoning chain.".to_string());
    }
    if EQUALITY.count(joined) >= EQUALITY_LIMIT {
        issues.push("Too many equality statements; possible unresolved algebra.".to_string());
    }
    if solved != planned {
        issues.push("Number of solved steps does not match skeleton.".to_string());
    }
    issues
}

/// Split expected checks into (passed, failed).
pub fn evaluate_checks(checks: &[String], joined: &str) -> (Vec<String>, Vec<String>) {
    let lowered = joined.to_lowercase();
    checks.iter().cloned().partition(|check| {
        let lowered_check = check.to_lowercase();
        let first = lowered_check.split(' ').next().unwrap_or("");
        lowered.contains(first)
    })
}

/// Combine the parts into a [`VerificationResult`].
pub fn score_verification(
    passed_checks: Vec<String>,
    failed_checks: Vec<String>,
    issues: Vec<String>,
    critic_issues: &[String],
) -> VerificationResult {
    let total = (passed_checks.len() + failed_checks.len()).max(1);
    let penalty = (issues.len() as f64 * 0.1).min(0.4);
    let score = (passed_checks.len() as f64 / total as f64 - penalty).clamp(0.0, 1.0);
    let suggestions = if critic_issues.is_empty() {
        failed_checks
            .iter()
            .map(|check| format!("Address missing check: {check}"))
            .collect()
    } else {
        critic_issues.to_vec()
    };
    VerificationResult {
        passed: score >= PASS_THRESHOLD && issues.is_empty(),
        issues,
        passed_checks,
        failed_checks,
        suggestions,
        score,
    }
}

/// Verify solved steps against their skeleton.
///
/// `call` should target the simple model; its timeout is capped at
/// [`CRITIC_TIMEOUT_CAP`].
///
/// # Panics
///
/// This function never panics.
pub async fn verify_solution(
    call: &ProviderCall<'_>,
    query: &str,
    skeleton: &ReasoningSkeleton,
    steps: &[SolvedStep],
) -> VerificationResult {
    let joined = joined_content(steps);
    let (passed_checks, failed_checks) = evaluate_checks(&skeleton.expected_checks, &joined);
    let mut issues = heuristic_issues(&joined, steps.len(), skeleton.substeps.len());

    let critic = call.capped(CRITIC_TIMEOUT_CAP);
    let verdict = match critic.invoke(&critic_prompt(query, skeleton, steps)).await {
        Ok(raw) => parse_critic(&raw),
        Err(e) => {
            metrics::inc_provider_error("critic");
            warn!(stage = "verifier", error = %e, "critic call failed; treating as no findings");
            CriticVerdict::Clean
        }
    };
    let critic_issues = verdict.into_issues();
    issues.extend(critic_issues.iter().cloned());

    let result = score_verification(passed_checks, failed_checks, issues, &critic_issues);
    debug!(
        stage = "verifier",
        score = result.score,
        passed = result.passed,
        issues = result.issues.len(),
        "verification complete"
    );
    result
}
