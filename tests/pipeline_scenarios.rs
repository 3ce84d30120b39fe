//! # End-to-end reasoning scenarios
//!
//! Drives whole queries through [`Reasoner`] and [`Orchestrator`] with
//! network-free providers and checks the externally visible contract:
//! which path a query takes, what the result carries, and which prompts the
//! provider was (or was not) asked to answer.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use reason_orchestrator::config::ReasonerConfig;
use reason_orchestrator::memory::{now_ms, Trace, TraceStore};
use reason_orchestrator::pipeline::MAX_REPAIRS;
use reason_orchestrator::stages::markers;
use reason_orchestrator::stages::verifier::PASS_THRESHOLD;
use reason_orchestrator::{
    DeterministicProvider, Domain, Mode, Orchestrator, OrchestratorError, Provider,
    ProviderError, ProviderKind, Reasoner, ReasoningPath,
};

const SOCRATES: &str = "All men are mortal. Socrates is a man. Is Socrates mortal?";
const SOCRATES_CONDITIONAL: &str =
    "If all humans are mortal and Socrates is human, is Socrates mortal?";

// ============================================================================
// Helpers
// ============================================================================

fn config() -> ReasonerConfig {
    let mut config = ReasonerConfig::default();
    config.performance.retry_backoff_ms = 0;
    config
}

/// Deterministic provider that keeps every prompt it was sent.
#[derive(Default)]
struct RecordingProvider {
    prompts: Mutex<Vec<String>>,
}

impl RecordingProvider {
    fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    fn count_containing(&self, marker: &str) -> usize {
        self.prompts().iter().filter(|p| p.contains(marker)).count()
    }
}

#[async_trait]
impl Provider for RecordingProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Mock
    }

    async fn invoke(
        &self,
        prompt: &str,
        _model: &str,
        _timeout: Duration,
    ) -> Result<String, ProviderError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        Ok(DeterministicProvider::respond(prompt))
    }
}

/// Provider whose answers trip every repair trigger. Plans never parse, every
/// step carries bad arithmetic plus a contradiction, and the critic objects.
#[derive(Default)]
struct HostileProvider {
    repairs: Mutex<usize>,
}

impl HostileProvider {
    fn repairs(&self) -> usize {
        self.repairs.lock().map(|n| *n).unwrap_or_default()
    }
}

#[async_trait]
impl Provider for HostileProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Mock
    }

    async fn invoke(
        &self,
        prompt: &str,
        _model: &str,
        _timeout: Duration,
    ) -> Result<String, ProviderError> {
        if prompt.contains(markers::PLAN) {
            return Ok("no plan today".to_string());
        }
        if prompt.contains(markers::CRITIC) {
            return Ok("- the arithmetic is wrong\n- step 2 contradicts step 1".to_string());
        }
        if prompt.contains(markers::REPAIR) {
            if let Ok(mut n) = self.repairs.lock() {
                *n += 1;
            }
            return Ok("Step 1: 2 + 2 = 5. The claim is true and the claim is not true.".to_string());
        }
        Ok("2 + 2 = 5. The claim is true and the claim is not true.".to_string())
    }
}

/// Provider that fails every call.
struct DownProvider;

#[async_trait]
impl Provider for DownProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Mock
    }

    async fn invoke(
        &self,
        _prompt: &str,
        _model: &str,
        _timeout: Duration,
    ) -> Result<String, ProviderError> {
        Err(ProviderError::Request {
            provider: ProviderKind::Mock,
            message: "connection refused".to_string(),
        })
    }
}

// ============================================================================
// Paths
// ============================================================================

#[tokio::test]
async fn test_arithmetic_sanity_query_takes_quick_path() {
    let reasoner = Reasoner::new(config()).await.expect("test: reasoner");
    let result = reasoner.reason("What is 2 + 2?").await;

    assert_eq!(result.verdict, "4");
    assert_eq!(result.mode, Mode::Reflex);
    assert_eq!(result.domain, Domain::Math);
    assert_eq!(result.metadata.path, ReasoningPath::Quick);
    assert_eq!(result.evolution_step, None);
}

#[tokio::test]
async fn test_short_arithmetic_never_reaches_planning_or_critic() {
    let provider = Arc::new(RecordingProvider::default());
    let reasoner = Reasoner::with_provider(config(), provider.clone())
        .await
        .expect("test: reasoner");

    let result = reasoner.reason("12 * 3").await;
    assert_eq!(result.metadata.path, ReasoningPath::Quick);

    for marker in [markers::PLAN, markers::STEP, markers::CRITIC, markers::REPAIR] {
        assert_eq!(
            provider.count_containing(marker),
            0,
            "quick path must not send a {marker:?} prompt"
        );
    }
}

#[tokio::test]
async fn test_syllogism_takes_full_path_with_audit() {
    let provider = Arc::new(RecordingProvider::default());
    let reasoner = Reasoner::with_provider(config(), provider.clone())
        .await
        .expect("test: reasoner");

    let result = reasoner.reason(SOCRATES).await;

    assert_eq!(result.metadata.path, ReasoningPath::Full);
    assert_eq!(result.domain, Domain::Logic);
    assert!(result.verdict.to_lowercase().contains("mortal"));
    assert!((0.4..=0.98).contains(&result.confidence));
    assert!(provider.count_containing(markers::PLAN) >= 1);
    assert!(provider.count_containing(markers::CRITIC) >= 1);

    let audit = result.metadata.audit.expect("test: full path carries an audit trail");
    assert!(audit.retries <= MAX_REPAIRS);
    assert!(!audit.skeleton.substeps.is_empty());
}

#[tokio::test]
async fn test_conditional_syllogism_is_logic_with_mortal_verdict() {
    let reasoner = Reasoner::new(config()).await.expect("test: reasoner");
    let result = reasoner.reason(SOCRATES_CONDITIONAL).await;

    assert_eq!(result.metadata.path, ReasoningPath::Full);
    assert_eq!(result.domain, Domain::Logic);
    assert!(result.verdict.to_lowercase().contains("mortal"));
    assert!(matches!(result.mode, Mode::Analytic | Mode::Reflective));
    assert!((0.4..=0.98).contains(&result.confidence));
}

#[tokio::test]
async fn test_confidence_stays_in_unit_interval_across_queries() {
    let reasoner = Reasoner::new(config()).await.expect("test: reasoner");
    for query in [
        "What is 2 + 2?",
        "What is the capital of France?",
        SOCRATES,
        "Should we trust an AI system with decisions about human welfare and safety?",
        "Compare the tradeoffs between three sorting algorithms for nearly sorted data",
    ] {
        let result = reasoner.reason(query).await;
        assert!(
            (0.0..=1.0).contains(&result.confidence),
            "{query}: confidence {} out of range",
            result.confidence
        );
        assert!(!result.verdict.trim().is_empty(), "{query}: empty verdict");
    }
}

// ============================================================================
// Repair bound
// ============================================================================

#[tokio::test]
async fn test_repair_runs_exactly_once_when_every_check_fails() {
    let provider = Arc::new(HostileProvider::default());
    let reasoner = Reasoner::with_provider(config(), provider.clone())
        .await
        .expect("test: reasoner");

    let result = reasoner
        .reason("Prove that the sum of the first ten odd numbers equals 100, step by step")
        .await;

    assert_eq!(result.metadata.path, ReasoningPath::Full);
    let audit = result.metadata.audit.expect("test: audit");

    // every finding source reported
    assert!(!audit.math.passed, "math check should fail on 2 + 2 = 5");
    assert!(!audit.logic.consistent, "logic check should flag the contradiction");
    assert!(!audit.issues.is_empty(), "critic issues should be recorded");
    assert!(audit.verification_score < PASS_THRESHOLD);

    assert_eq!(provider.repairs(), MAX_REPAIRS as usize);
    assert_eq!(audit.retries, MAX_REPAIRS);
    assert!(audit.repair.is_some());
    assert!(result.violations > 0);
    assert!((0.0..=1.0).contains(&result.confidence));
}

#[tokio::test]
async fn test_provider_outage_degrades_instead_of_failing() {
    let reasoner = Reasoner::with_provider(config(), Arc::new(DownProvider))
        .await
        .expect("test: reasoner");

    let quick = reasoner.reason("What is 2 + 2?").await;
    assert_eq!(quick.metadata.path, ReasoningPath::Quick);
    assert!(!quick.verdict.is_empty());

    let full = reasoner.reason(SOCRATES).await;
    assert_eq!(full.metadata.path, ReasoningPath::Full);
    assert!(!full.verdict.is_empty());
    let audit = full.metadata.audit.expect("test: audit");
    assert!(audit.fallback_steps > 0);
}

// ============================================================================
// Trace cache
// ============================================================================

#[tokio::test]
async fn test_persisted_trace_is_served_from_cache() {
    let dir = tempfile::tempdir().expect("test: tempdir");
    let mut config = config();
    config.memory.enabled = true;
    config.memory.path = dir
        .path()
        .join("traces.db")
        .to_string_lossy()
        .into_owned();

    {
        let store = TraceStore::open(&config.memory).await;
        store
            .record(Trace {
                query: SOCRATES.to_string(),
                verdict: "Yes, Socrates is mortal.".to_string(),
                confidence: 0.9,
                mode: Mode::Analytic,
                domain: Domain::Logic,
                accuracy: 0.95,
                latency_ms: 120,
                timestamp_ms: now_ms().saturating_sub(10_000),
            })
            .await;
    }

    let provider = Arc::new(RecordingProvider::default());
    let reasoner = Reasoner::with_provider(config, provider.clone())
        .await
        .expect("test: reasoner");
    let result = reasoner.reason(SOCRATES).await;

    assert_eq!(result.metadata.path, ReasoningPath::Cached);
    assert_eq!(result.verdict, "Yes, Socrates is mortal.");
    assert_eq!(result.mode, Mode::Reflex);
    assert!((result.confidence - 0.95).abs() < 1e-9);
    assert!(result.metadata.cache_similarity.unwrap_or_default() >= 0.9);
    assert!(provider.prompts().is_empty(), "cache hit must not call the provider");

    let stats = reasoner.memory_stats();
    assert_eq!(stats.cache_hits, 1);
}

#[tokio::test]
async fn test_repeated_query_hits_cache_after_freshness_window() {
    let dir = tempfile::tempdir().expect("test: tempdir");
    let mut config = config();
    config.memory.enabled = true;
    config.memory.path = dir
        .path()
        .join("repeat.db")
        .to_string_lossy()
        .into_owned();
    let reasoner = Reasoner::new(config).await.expect("test: reasoner");

    let first = reasoner.reason(SOCRATES_CONDITIONAL).await;
    assert_eq!(first.metadata.path, ReasoningPath::Full);

    tokio::time::sleep(Duration::from_millis(2_100)).await;

    let second = reasoner.reason(SOCRATES_CONDITIONAL).await;
    assert_eq!(second.metadata.path, ReasoningPath::Cached);
    assert_eq!(second.mode, Mode::Reflex);
    assert!(second.metadata.cache_similarity.unwrap_or_default() >= 0.9);
    assert!(!second.verdict.trim().is_empty());
    assert_eq!(reasoner.memory_stats().cache_hits, 1);
}

#[tokio::test]
async fn test_fresh_trace_is_not_served_from_cache() {
    let dir = tempfile::tempdir().expect("test: tempdir");
    let mut config = config();
    config.memory.enabled = true;
    config.memory.path = dir
        .path()
        .join("fresh.db")
        .to_string_lossy()
        .into_owned();

    {
        let store = TraceStore::open(&config.memory).await;
        store
            .record(Trace {
                query: SOCRATES.to_string(),
                verdict: "Yes, Socrates is mortal.".to_string(),
                confidence: 0.9,
                mode: Mode::Analytic,
                domain: Domain::Logic,
                accuracy: 0.95,
                latency_ms: 120,
                timestamp_ms: now_ms(),
            })
            .await;
    }

    let reasoner = Reasoner::with_provider(config, Arc::new(DeterministicProvider::new()))
        .await
        .expect("test: reasoner");
    let result = reasoner.reason(SOCRATES).await;
    assert_eq!(result.metadata.path, ReasoningPath::Full);
}

// ============================================================================
// Facade
// ============================================================================

#[tokio::test]
async fn test_orchestrator_rejects_queries_before_init() {
    let orchestrator = Orchestrator::new();
    let err = orchestrator
        .reason(SOCRATES)
        .await
        .expect_err("test: must fail before init");
    assert!(matches!(err, OrchestratorError::NotInitialized));

    orchestrator
        .init_with_provider(config(), Arc::new(DeterministicProvider::new()))
        .await
        .expect("test: init");
    let result = orchestrator.reason("What is 2 + 2?").await.expect("test: reason");
    assert_eq!(result.verdict, "4");
}

#[tokio::test]
async fn test_concurrent_runs_share_one_reasoner() {
    let reasoner = Arc::new(Reasoner::new(config()).await.expect("test: reasoner"));
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let reasoner = Arc::clone(&reasoner);
            tokio::spawn(async move {
                let query = if i % 2 == 0 { "What is 2 + 2?" } else { SOCRATES };
                reasoner.reason(query).await
            })
        })
        .collect();

    for handle in handles {
        let result = handle.await.expect("test: join");
        assert!((0.0..=1.0).contains(&result.confidence));
    }
    assert_eq!(reasoner.evolution_stats().window.len(), 4);
}
