//! Offline deterministic provider.
//!
//! Answers without any network access by recognising which stage built the
//! prompt (via the markers in [`crate::stages::markers`]) and responding with
//! a fixed, well-formed payload for that stage:
//!
//! | Prompt kind | Response |
//! |-------------|----------|
//! | planning    | JSON skeleton sized by the `- depth:` line |
//! | critic      | `OK` |
//! | repair      | the original reasoning, unchanged |
//! | step        | `Step N: ...` templated on the `Domain:` / `Mode:` markers |
//! | anything else | a fixed sanity answer for the embedded question |

use super::{Provider, ProviderError, ProviderKind};
use crate::stages::markers;
use async_trait::async_trait;
use std::time::Duration;

const DEFAULT_ANSWER: &str = "Here is a concise answer based on the prompt.";

/// Deterministic, network-free provider for tests and offline runs.
#[derive(Debug, Clone, Default)]
pub struct DeterministicProvider {
    /// Simulated latency per call.
    pub delay: Duration,
}

impl DeterministicProvider {
    /// Provider that answers immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider that sleeps `delay` before every answer.
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay }
    }

    /// Compute the response for a prompt.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn respond(prompt: &str) -> String {
        if prompt.contains(markers::PLAN) {
            plan_response(prompt)
        } else if prompt.contains(markers::CRITIC) {
            "OK".to_string()
        } else if prompt.contains(markers::REPAIR) {
            repair_response(prompt)
        } else if let Some(step) = step_number(prompt) {
            step_response(prompt, step)
        } else {
            sanity_answer(subject(prompt)).to_string()
        }
    }
}

#[async_trait]
impl Provider for DeterministicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Mock
    }

    async fn invoke(
        &self,
        prompt: &str,
        _model: &str,
        _timeout: Duration,
    ) -> Result<String, ProviderError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(Self::respond(prompt))
    }
}

// ── Sanity answers ───────────────────────────────────────────────────────

/// Fixed answers for well-known sanity questions.
pub fn sanity_answer(question: &str) -> &'static str {
    let q = question.to_lowercase();
    if q.contains("2 + 2") || q.contains("2+2") {
        "4"
    } else if q.contains("capital of france") {
        "Paris"
    } else if q.contains("socrates") && q.contains("mortal") {
        "Yes, Socrates is mortal."
    } else if q.contains("should") && (q.contains("ai") || q.contains("robot")) {
        "It depends on ethical frameworks; generally, we should prioritize human welfare."
    } else {
        DEFAULT_ANSWER
    }
}

/// The question a prompt is about: the text after the quick-respond
/// instruction, else the `Problem:` or `Query:` line, else the whole prompt.
fn subject(prompt: &str) -> &str {
    if let Some(idx) = prompt.find(markers::QUICK) {
        let rest = &prompt[idx..];
        return rest.split_once('\n').map_or(rest, |(_, q)| q);
    }
    line_value(prompt, "Problem:")
        .or_else(|| line_value(prompt, "Query:"))
        .unwrap_or(prompt)
}

fn line_value<'a>(prompt: &'a str, key: &str) -> Option<&'a str> {
    prompt
        .lines()
        .find_map(|line| line.strip_prefix(key))
        .map(str::trim)
}

// ── Stage responses ──────────────────────────────────────────────────────

fn plan_response(prompt: &str) -> String {
    let depth: usize = line_value(prompt, "- depth:")
        .and_then(|d| d.parse().ok())
        .unwrap_or(2);
    let domain = line_value(prompt, "- domain:").unwrap_or("general");

    let body = [
        "Identify the premises of the question",
        "Apply the governing rule to the premises",
        "Check the result against the premises",
        "Weigh alternative readings of the premises",
    ];
    let count = depth.clamp(1, 3) + 1;
    let mut substeps: Vec<&str> = body.iter().take(count).copied().collect();
    substeps.push("State the conclusion");

    let payload = serde_json::json!({
        "claim": format!("Resolve the {domain} question"),
        "substeps": substeps,
        "expectedChecks": ["Premises identified", "Conclusion stated"],
    });
    format!("```json\n{payload}\n```")
}

fn repair_response(prompt: &str) -> String {
    let Some(start) = prompt.find(markers::REPAIR_ORIGINAL) else {
        return String::new();
    };
    let rest = &prompt[start + markers::REPAIR_ORIGINAL.len()..];
    let end = rest.find(markers::REPAIR_ISSUES).unwrap_or(rest.len());
    rest[..end].to_string()
}

fn step_number(prompt: &str) -> Option<usize> {
    let idx = prompt.find(markers::STEP)?;
    prompt[idx + markers::STEP.len()..]
        .split_whitespace()
        .next()?
        .parse()
        .ok()
}

fn step_response(prompt: &str, step: usize) -> String {
    let domain = line_value(prompt, "Domain:").unwrap_or("general");
    let mode = line_value(prompt, "Mode:").unwrap_or("analytic");
    let instruction = line_value(prompt, "Current instruction:")
        .unwrap_or("continue the reasoning")
        .to_lowercase();
    let fact = sanity_answer(subject(prompt));
    format!(
        "Step {step}: Considering the premises for step {step} ({mode} {domain} reasoning), \
         we {instruction}; the relation premise = conclusion holds, therefore the inference \
         is valid. {fact}"
    )
}
