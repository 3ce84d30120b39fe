//! Stepwise solving.
//!
//! Each skeleton substep becomes one provider call that sees the plan, the
//! current instruction and every step solved so far. Steps are solved in
//! order; a step that keeps failing gets the fallback sentence instead of
//! aborting the run.

use super::{fallback_step_content, markers, ProviderCall, ReasoningSkeleton};
use crate::intelligence::templates::TemplateRegistry;
use crate::metrics;
use crate::retry::RetryPolicy;
use crate::routing::Classification;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Provider calls per step before the fallback sentence is used.
pub const STEP_ATTEMPTS: usize = 3;

/// One solved step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolvedStep {
    /// `Step N`.
    pub title: String,
    /// The reasoning for this step.
    pub content: String,
}

impl SolvedStep {
    /// Step `number` (1-based) with the given content.
    pub fn new(number: usize, content: impl Into<String>) -> Self {
        Self {
            title: format!("Step {number}"),
            content: content.into(),
        }
    }
}

/// Solver result plus the raw attempt log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SolverOutput {
    /// Exactly one entry per skeleton substep.
    pub steps: Vec<SolvedStep>,
    /// `step_{n}_attempt_{a}: raw` and `step_{n}_error_{a}: message` lines.
    pub scratchpad: Vec<String>,
    /// Steps that exhausted their attempts and carry the fallback sentence.
    pub fallback_steps: usize,
}

fn step_prompt(
    preamble: &str,
    query: &str,
    skeleton: &ReasoningSkeleton,
    classification: &Classification,
    index: usize,
    prior: &[SolvedStep],
) -> String {
    let number = index + 1;
    let instruction = skeleton.substeps.get(index).map_or("", String::as_str);
    let prior_text = if prior.is_empty() {
        "None yet".to_string()
    } else {
        prior
            .iter()
            .enumerate()
            .map(|(i, step)| format!("Step {}: {}", i + 1, step.content))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        "{preamble}\n\n\
         {step_marker}{number} of {total} for the problem below.\n\
         Follow the provided instruction exactly. Do not rewrite previous steps.\n\n\
         Problem: {query}\n\
         Current instruction: {instruction}\n\
         Overall claim: {claim}\n\
         Classification: type={kind}, difficulty={difficulty}, depth={depth}\n\
         Prior steps:\n{prior_text}\n\
         Expected checks:\n- {checks}\n\n\
         Respond with:\n\
         Step {number}: <concise reasoning for this instruction>\n",
        step_marker = markers::STEP,
        total = skeleton.substeps.len(),
        claim = skeleton.claim,
        kind = classification.query_type,
        difficulty = classification.difficulty,
        depth = classification.required_depth,
        checks = skeleton.expected_checks.join("\n- "),
    )
}

/// Content of a step response: the rest of the line after `Step N:`
/// (case-insensitive), else the whole trimmed response.
pub fn extract_step_content(raw: &str, number: usize) -> String {
    let labelled = Regex::new(&format!(r"(?i)Step {number}:(.*)"))
        .ok()
        .and_then(|re| re.captures(raw).and_then(|c| c.get(1)))
        .map(|m| m.as_str().trim().to_string());
    labelled.unwrap_or_else(|| raw.trim().to_string())
}

/// Solve every substep in order.
///
/// Each step gets [`STEP_ATTEMPTS`] provider calls whatever the configured
/// retry budget; `retry` only supplies the wait between them. An error or an
/// empty answer counts as a failed attempt.
///
/// # Panics
///
/// This function never panics.
pub async fn solve_skeleton(
    call: &ProviderCall<'_>,
    retry: &RetryPolicy,
    templates: &TemplateRegistry,
    query: &str,
    skeleton: &ReasoningSkeleton,
    classification: &Classification,
) -> SolverOutput {
    let preamble = templates.preamble(query, classification.mode(), classification.domain);
    let mut output = SolverOutput::default();

    for (index, instruction) in skeleton.substeps.iter().enumerate() {
        let number = index + 1;
        let prompt = step_prompt(
            &preamble,
            query,
            skeleton,
            classification,
            index,
            &output.steps,
        );

        let mut content = String::new();
        for attempt in 1..=STEP_ATTEMPTS {
            match call.invoke(&prompt).await {
                Ok(raw) => {
                    output
                        .scratchpad
                        .push(format!("step_{number}_attempt_{attempt}: {}", raw.trim()));
                    content = extract_step_content(&raw, number);
                }
                Err(e) => {
                    metrics::inc_provider_error("solver");
                    warn!(stage = "solver", step = number, attempt = attempt, error = %e, "step call failed");
                    output
                        .scratchpad
                        .push(format!("step_{number}_error_{attempt}: {e}"));
                }
            }
            if !content.is_empty() {
                break;
            }
            if attempt < STEP_ATTEMPTS {
                tokio::time::sleep(retry.backoff(attempt)).await;
            }
        }

        if content.is_empty() {
            output.fallback_steps += 1;
            content = fallback_step_content(instruction);
        }
        debug!(stage = "solver", step = number, chars = content.len(), "step solved");
        output.steps.push(SolvedStep::new(number, content));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{DeterministicProvider, Provider, ProviderError, ProviderKind};
    use crate::routing::classify;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FailingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Provider for FailingProvider {
        fn kind(&self) -> ProviderKind {
            ProviderKind::Mock
        }

        async fn invoke(&self, _: &str, _: &str, _: Duration) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::EmptyResponse(ProviderKind::Mock))
        }
    }

    fn skeleton(n: usize) -> ReasoningSkeleton {
        ReasoningSkeleton {
            claim: "claim".to_string(),
            substeps: (1..=n).map(|i| format!("Do thing {i}")).collect(),
            expected_checks: vec!["Premises identified".to_string()],
        }
    }

    #[test]
    fn test_extract_step_content() {
        assert_eq!(extract_step_content("Step 2: the answer\nmore", 2), "the answer");
        assert_eq!(extract_step_content("step 2:   lower", 2), "lower");
        assert_eq!(extract_step_content("  unlabelled  ", 1), "unlabelled");
        assert_eq!(extract_step_content("Step 1:", 1), "");
    }

    #[tokio::test]
    async fn test_solver_produces_one_step_per_substep_in_order() {
        let query = "All men are mortal. Socrates is a man. Is Socrates mortal?";
        let provider = DeterministicProvider::new();
        let call = ProviderCall::new(&provider, "m", Duration::from_secs(1));
        let output = solve_skeleton(
            &call,
            &RetryPolicy::new(3, Duration::ZERO),
            &TemplateRegistry::new(),
            query,
            &skeleton(4),
            &classify(query),
        )
        .await;

        assert_eq!(output.steps.len(), 4);
        for (i, step) in output.steps.iter().enumerate() {
            assert_eq!(step.title, format!("Step {}", i + 1));
            assert!(step.content.contains(&format!("do thing {}", i + 1)));
        }
        assert_eq!(output.scratchpad.len(), 4);
        assert!(output.scratchpad[0].starts_with("step_1_attempt_1: Step 1:"));
        assert_eq!(output.fallback_steps, 0);
    }

    #[tokio::test]
    async fn test_solver_falls_back_after_three_attempts() {
        let provider = FailingProvider {
            calls: AtomicUsize::new(0),
        };
        let call = ProviderCall::new(&provider, "m", Duration::from_secs(1));
        let output = solve_skeleton(
            &call,
            &RetryPolicy::new(3, Duration::ZERO),
            &TemplateRegistry::new(),
            "q",
            &skeleton(2),
            &classify("Why is the sky blue today?"),
        )
        .await;

        assert_eq!(provider.calls.load(Ordering::SeqCst), 6);
        assert_eq!(output.fallback_steps, 2);
        assert_eq!(
            output.steps[0].content,
            "Unable to complete instruction \"Do thing 1\"; fallback explanation provided."
        );
        assert_eq!(output.scratchpad[2], format!("step_1_error_3: {}", ProviderError::EmptyResponse(ProviderKind::Mock)));
    }

    #[tokio::test]
    async fn test_step_attempts_ignore_configured_retry_budget() {
        for budget in [1, 5] {
            let provider = FailingProvider {
                calls: AtomicUsize::new(0),
            };
            let call = ProviderCall::new(&provider, "m", Duration::from_secs(1));
            let output = solve_skeleton(
                &call,
                &RetryPolicy::new(budget, Duration::ZERO),
                &TemplateRegistry::new(),
                "q",
                &skeleton(4),
                &classify("Why is the sky blue today?"),
            )
            .await;

            assert_eq!(
                provider.calls.load(Ordering::SeqCst),
                4 * STEP_ATTEMPTS,
                "budget {budget} changed the per-step attempt count"
            );
            assert_eq!(output.fallback_steps, 4);
        }
    }
}
