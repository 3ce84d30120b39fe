//! Quick-respond short circuit.
//!
//! For queries the classifier marks as trivially resolvable: try the
//! deterministic domain engine first, otherwise make one (retried) call on
//! the simple model. Confidence comes straight from the evaluator and is not
//! run through the finalizer's calibration.

use super::{markers, ProviderCall};
use crate::engines;
use crate::intelligence::quality::{evaluate, Evaluation};
use crate::intelligence::templates::TemplateRegistry;
use crate::metrics;
use crate::retry::RetryPolicy;
use crate::routing::{Classification, Mode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Verdict used when every provider attempt failed.
pub const QUICK_FALLBACK_VERDICT: &str = "No answer could be produced for this query.";

/// Where a quick verdict came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuickSource {
    /// A deterministic domain engine.
    Engine,
    /// The provider.
    Provider,
    /// Every provider attempt failed.
    Fallback,
}

/// Result of the quick path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickResponse {
    /// The answer text.
    pub verdict: String,
    /// Where it came from.
    pub source: QuickSource,
    /// Evaluator scores over the answer in reflex mode.
    pub evaluation: Evaluation,
}

fn quick_prompt(templates: &TemplateRegistry, query: &str, classification: &Classification) -> String {
    format!(
        "{}\n\n{} with no intermediate reasoning unless absolutely necessary:\n{query}",
        templates.preamble(query, Mode::Reflex, classification.domain),
        markers::QUICK,
    )
}

/// Answer without planning.
///
/// # Panics
///
/// This function never panics.
pub async fn quick_respond(
    call: &ProviderCall<'_>,
    retry: &RetryPolicy,
    templates: &TemplateRegistry,
    query: &str,
    classification: &Classification,
) -> QuickResponse {
    let domain = classification.domain;
    let (verdict, source) = match engines::solve(domain, query) {
        Some(answer) => {
            debug!(stage = "quick", domain = %domain, "answered by domain engine");
            (answer, QuickSource::Engine)
        }
        None => {
            let prompt = quick_prompt(templates, query, classification);
            match retry.run("quick", || call.invoke(&prompt)).await {
                Ok(answer) => (answer.trim().to_string(), QuickSource::Provider),
                Err(e) => {
                    metrics::inc_provider_error("quick");
                    warn!(stage = "quick", error = %e, "quick respond exhausted retries");
                    (QUICK_FALLBACK_VERDICT.to_string(), QuickSource::Fallback)
                }
            }
        }
    };

    let evaluation = evaluate(&verdict, query, domain, Mode::Reflex);
    QuickResponse {
        verdict,
        source,
        evaluation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{DeterministicProvider, Provider, ProviderError, ProviderKind};
    use crate::routing::classify;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingProvider {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Provider for CountingProvider {
        fn kind(&self) -> ProviderKind {
            ProviderKind::Mock
        }

        async fn invoke(&self, prompt: &str, _: &str, _: Duration) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ProviderError::Timeout(Duration::from_millis(1)))
            } else {
                Ok(DeterministicProvider::respond(prompt))
            }
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_engine_answers_arithmetic_without_provider() {
        let provider = CountingProvider {
            calls: AtomicUsize::new(0),
            fail: false,
        };
        let call = ProviderCall::new(&provider, "m", Duration::from_secs(1));
        let query = "What is 2 + 2?";
        let response =
            quick_respond(&call, &policy(), &TemplateRegistry::new(), query, &classify(query)).await;
        assert_eq!(response.verdict, "4");
        assert_eq!(response.source, QuickSource::Engine);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert!((0.0..=1.0).contains(&response.evaluation.confidence));
    }

    #[tokio::test]
    async fn test_provider_answers_general_question() {
        let provider = CountingProvider {
            calls: AtomicUsize::new(0),
            fail: false,
        };
        let call = ProviderCall::new(&provider, "m", Duration::from_secs(1));
        let query = "Capital of France?";
        let response =
            quick_respond(&call, &policy(), &TemplateRegistry::new(), query, &classify(query)).await;
        assert_eq!(response.verdict, "Paris");
        assert_eq!(response.source, QuickSource::Provider);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(response.evaluation.compliance, 1.0);
    }

    #[tokio::test]
    async fn test_exhausted_retries_fall_back() {
        let provider = CountingProvider {
            calls: AtomicUsize::new(0),
            fail: true,
        };
        let call = ProviderCall::new(&provider, "m", Duration::from_secs(1));
        let query = "Capital of France?";
        let response =
            quick_respond(&call, &policy(), &TemplateRegistry::new(), query, &classify(query)).await;
        assert_eq!(response.verdict, QUICK_FALLBACK_VERDICT);
        assert_eq!(response.source, QuickSource::Fallback);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }
}
