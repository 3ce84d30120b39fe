//! # Stage: Reasoning Pipeline
//!
//! ## Responsibility
//! Drive one query through the whole system: classify it, then take exactly
//! one of three paths.
//!
//! ```text
//! classify ─┬─ must stop ──────────────► quick respond ─► trace
//!           ├─ cache hit ──────────────► stored verdict
//!           └─ otherwise ─► structure ─► skeleton ─► solve ─► verify
//!                           ─► (repair ─► re-verify) ─► unify ─► finalize
//!                           ─► evaluate ─► trace ─► evolve
//! ```
//!
//! ## Guarantees
//! - Infallible: [`Reasoner::reason`] always returns a [`ReasoningResult`];
//!   provider and storage failures degrade to fallbacks
//! - Single classification: the [`Classification`] is computed once and
//!   passed by reference to every later stage
//! - Bounded: at most one repair pass per run
//! - Shareable: [`Reasoner`] is `Send + Sync`; concurrent runs share only the
//!   trace store and the evolution engine
//!
//! ## NOT Responsible For
//! - Stage internals (those belong to `stages`, `structure`, `routing`)
//! - Process-level setup such as tracing and metrics registration

use crate::config::validation::summarize;
use crate::config::{validate, ReasonerConfig};
use crate::evolution::{EvolutionEngine, EvolutionStats, PerformanceSample};
use crate::intelligence::quality::{evaluate, self_consistency, unified_quality};
use crate::intelligence::templates::{load_seeds, TemplateRegistry};
use crate::memory::{now_ms, CacheHit, MemoryStats, Trace, TraceStore};
use crate::metrics;
use crate::provider::{build_provider, Provider};
use crate::retry::RetryPolicy;
use crate::routing::{classify, estimate_complexity, Classification, Domain, Mode};
use crate::stages::{
    collect_repair_instructions, finalize, generate_skeleton, quick_respond, repair_reasoning,
    solve_skeleton, unify, verify_logic, verify_math, verify_solution, LogicVerification,
    MathVerification, ProviderCall, ReasoningSkeleton, CONFIDENCE_FLOOR,
};
use crate::structure::{decompose, detect_structure, formal_skeleton, FormalSchema, StructureKind};
use crate::OrchestratorError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;
use tracing::{debug, info, warn, Instrument};

/// Repair passes allowed per run.
pub const MAX_REPAIRS: u32 = 1;
/// Confidence bonus applied to a cached verdict.
pub const CACHE_CONFIDENCE_BONUS: f64 = 0.05;

// ── Result types ─────────────────────────────────────────────────────────

/// Which path produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningPath {
    /// Single quick call (or a domain engine).
    Quick,
    /// Reused a stored verdict.
    Cached,
    /// Full solve/verify/repair pipeline.
    Full,
}

impl ReasoningPath {
    /// Stable lowercase name, used as the metrics label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasoningPath::Quick => "quick",
            ReasoningPath::Cached => "cached",
            ReasoningPath::Full => "full",
        }
    }
}

/// Outcome of the repair pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairSummary {
    /// Whether the repaired text replaced the original steps.
    pub success: bool,
    /// Instructions addressed.
    pub changes: usize,
}

/// Everything the full path learned about a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditTrail {
    /// Final verification score.
    pub verification_score: f64,
    /// Detected problem shape.
    pub structure: StructureKind,
    /// Selected formal schema.
    pub schema: FormalSchema,
    /// The plan that was solved.
    pub skeleton: ReasoningSkeleton,
    /// Checks found in the final steps.
    pub passed_checks: Vec<String>,
    /// Checks missing from the final steps.
    pub failed_checks: Vec<String>,
    /// Verifier issues after the last verification.
    pub issues: Vec<String>,
    /// Repair passes run (0 or 1).
    pub retries: u32,
    /// Present when a repair pass ran.
    pub repair: Option<RepairSummary>,
    /// Math validator report.
    pub math: MathVerification,
    /// Logic validator report.
    pub logic: LogicVerification,
    /// Unifier coherence.
    pub coherence: f64,
    /// Steps the unifier dropped as contradicted.
    pub removed_contradictions: usize,
    /// Self-consistency of the unified text.
    pub self_consistency: f64,
    /// Steps that fell back after exhausting retries.
    pub fallback_steps: usize,
    /// Raw solver attempts and errors.
    pub scratchpad: Vec<String>,
}

/// Per-run metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningMetadata {
    /// Path taken.
    pub path: ReasoningPath,
    /// Evaluator accuracy (stored accuracy on the cached path).
    pub accuracy: f64,
    /// Evaluator compliance; absent on the cached path.
    pub compliance: Option<f64>,
    /// Unified quality; absent on the cached path.
    pub quality: Option<f64>,
    /// Similarity to the reused trace on the cached path.
    pub cache_similarity: Option<f64>,
    /// Active template version when the run started.
    pub template_version: u64,
    /// Full-path audit.
    pub audit: Option<AuditTrail>,
}

/// Result of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningResult {
    /// Answer text.
    pub verdict: String,
    /// In `[0, 1]`; in `[0.4, 0.98]` on the full path.
    pub confidence: f64,
    /// Reported mode.
    pub mode: Mode,
    /// Query domain.
    pub domain: Domain,
    /// Continuous complexity estimate of the query.
    pub complexity: f64,
    /// Verifier issues plus failed validators.
    pub violations: usize,
    /// Evolution step fired by this run, if any.
    pub evolution_step: Option<u64>,
    /// End-to-end latency.
    pub latency_ms: u64,
    /// Path and diagnostics.
    pub metadata: ReasoningMetadata,
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

// ── Reasoner ─────────────────────────────────────────────────────────────

/// A configured reasoning pipeline.
pub struct Reasoner {
    config: ReasonerConfig,
    provider: Arc<dyn Provider>,
    templates: Arc<TemplateRegistry>,
    memory: Option<TraceStore>,
    evolution: EvolutionEngine,
    retry: RetryPolicy,
}

impl Reasoner {
    /// Build a reasoner, constructing the provider from the config.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::ConfigError`] for an invalid config or a network
    /// provider without credentials.
    pub async fn new(config: ReasonerConfig) -> Result<Self, OrchestratorError> {
        validate_config(&config)?;
        let provider = build_provider(config.provider, &config.credentials)
            .map_err(|e| OrchestratorError::ConfigError(e.to_string()))?;
        Ok(Self::assemble(config, provider).await)
    }

    /// Build a reasoner around an existing provider. The config is still
    /// validated, but `config.provider` is not used to build anything.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::ConfigError`] for an invalid config.
    pub async fn with_provider(
        config: ReasonerConfig,
        provider: Arc<dyn Provider>,
    ) -> Result<Self, OrchestratorError> {
        validate_config(&config)?;
        Ok(Self::assemble(config, provider).await)
    }

    async fn assemble(config: ReasonerConfig, provider: Arc<dyn Provider>) -> Self {
        let seeds = match config.prompts.seeds_path.as_deref() {
            Some(path) => load_seeds(Path::new(path)).unwrap_or_else(|e| {
                warn!(path = %path, error = %e, "prompt seeds unavailable; using built-in templates");
                Vec::new()
            }),
            None => Vec::new(),
        };
        let templates = Arc::new(TemplateRegistry::with_seeds(seeds));

        let memory = if config.memory.enabled {
            Some(TraceStore::open(&config.memory).await)
        } else {
            None
        };

        let retry = RetryPolicy::from_config(&config.performance);
        let evolution = EvolutionEngine::new(config.evolution.clone(), Arc::clone(&templates));

        info!(
            provider = %provider.kind(),
            main_model = %config.main_model,
            memory = config.memory.enabled,
            "reasoner ready"
        );
        Self {
            config,
            provider,
            templates,
            memory,
            evolution,
            retry,
        }
    }

    /// The configuration in force.
    pub fn config(&self) -> &ReasonerConfig {
        &self.config
    }

    /// The template registry the learner mutates.
    pub fn templates(&self) -> &Arc<TemplateRegistry> {
        &self.templates
    }

    /// Trace store statistics; all zero when memory is disabled.
    pub fn memory_stats(&self) -> MemoryStats {
        self.memory
            .as_ref()
            .map(TraceStore::stats)
            .unwrap_or_default()
    }

    /// Learner statistics.
    pub fn evolution_stats(&self) -> EvolutionStats {
        self.evolution.stats()
    }

    fn call<'a>(&'a self, model: &'a str) -> ProviderCall<'a> {
        ProviderCall::new(self.provider.as_ref(), model, self.config.timeout())
    }

    /// Reason about `query`.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub async fn reason(&self, query: &str) -> ReasoningResult {
        let span = tracing::info_span!(
            "reasoner.run",
            path = tracing::field::Empty,
            latency_ms = tracing::field::Empty,
        );
        let result = self.run(query).instrument(span.clone()).await;
        span.record("path", result.metadata.path.as_str());
        span.record("latency_ms", result.latency_ms);
        metrics::inc_run(result.metadata.path.as_str());
        info!(
            path = result.metadata.path.as_str(),
            confidence = result.confidence,
            latency_ms = result.latency_ms,
            "reasoning complete"
        );
        result
    }

    async fn run(&self, query: &str) -> ReasoningResult {
        let start = Instant::now();
        let template_version = self.templates.active().version;

        let classification = classify(query);
        metrics::record_stage_latency("classify", start.elapsed());
        info!(
            stage = "classify",
            query_type = %classification.query_type,
            domain = %classification.domain,
            difficulty = classification.difficulty,
            depth = classification.required_depth,
            must_stop = classification.must_stop_reasoning,
            "query classified"
        );

        if classification.must_stop_reasoning {
            return self
                .quick_path(query, &classification, start, template_version)
                .await;
        }

        if let Some(hit) = self.memory.as_ref().and_then(|m| m.cache_lookup(query)) {
            return cached_result(query, &classification, hit, start, template_version);
        }

        self.full_path(query, &classification, start, template_version)
            .await
    }

    async fn quick_path(
        &self,
        query: &str,
        classification: &Classification,
        start: Instant,
        template_version: u64,
    ) -> ReasoningResult {
        let stage_start = Instant::now();
        let call = self.call(self.config.simple_model());
        let quick = quick_respond(&call, &self.retry, &self.templates, query, classification).await;
        metrics::record_stage_latency("quick", stage_start.elapsed());

        let latency_ms = elapsed_ms(start);
        let evaluation = quick.evaluation;
        let quality = unified_quality(evaluation.accuracy, evaluation.compliance, 0.0, latency_ms);

        if let Some(memory) = &self.memory {
            memory
                .record(Trace {
                    query: query.to_string(),
                    verdict: quick.verdict.clone(),
                    confidence: evaluation.confidence,
                    mode: Mode::Reflex,
                    domain: classification.domain,
                    accuracy: evaluation.accuracy,
                    latency_ms,
                    timestamp_ms: now_ms(),
                })
                .await;
        }

        ReasoningResult {
            verdict: quick.verdict,
            confidence: evaluation.confidence.clamp(0.0, 1.0),
            mode: Mode::Reflex,
            domain: classification.domain,
            complexity: estimate_complexity(query),
            violations: 0,
            evolution_step: None,
            latency_ms,
            metadata: ReasoningMetadata {
                path: ReasoningPath::Quick,
                accuracy: evaluation.accuracy,
                compliance: Some(evaluation.compliance),
                quality: Some(quality),
                cache_similarity: None,
                template_version,
                audit: None,
            },
        }
    }

    async fn full_path(
        &self,
        query: &str,
        classification: &Classification,
        start: Instant,
        template_version: u64,
    ) -> ReasoningResult {
        let domain = classification.domain;
        let depth_call = self.call(self.config.depth_model(classification.required_depth));
        let simple_call = self.call(self.config.simple_model());

        let context = self
            .memory
            .as_ref()
            .map(|m| m.context_for(query))
            .filter(|c| !c.is_empty());

        let stage_start = Instant::now();
        let structure = detect_structure(query, domain);
        let decomposition = decompose(&structure);
        let formal = formal_skeleton(&structure, &decomposition);
        metrics::record_stage_latency("structure", stage_start.elapsed());
        debug!(
            stage = "structure",
            kind = %structure.kind.as_str(),
            schema = %formal.schema.as_str(),
            "structure detected"
        );

        let stage_start = Instant::now();
        let skeleton = generate_skeleton(&depth_call, query, classification, context.as_deref()).await;
        metrics::record_stage_latency("skeleton", stage_start.elapsed());

        let stage_start = Instant::now();
        let solved = solve_skeleton(
            &depth_call,
            &self.retry,
            &self.templates,
            query,
            &skeleton,
            classification,
        )
        .await;
        metrics::record_stage_latency("solver", stage_start.elapsed());
        let mut steps = solved.steps;

        let stage_start = Instant::now();
        let mut verification = verify_solution(&simple_call, query, &skeleton, &steps).await;
        let joined = steps
            .iter()
            .map(|s| s.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let math = verify_math(&joined, &structure);
        let logic = verify_logic(&joined);
        metrics::record_stage_latency("verify", stage_start.elapsed());

        let mut retries = 0u32;
        let mut repair = None;
        let instructions = collect_repair_instructions(&math, &logic, &verification);
        if !instructions.is_empty() && retries < MAX_REPAIRS {
            retries += 1;
            let stage_start = Instant::now();
            let outcome = repair_reasoning(&simple_call, &steps, &skeleton, &instructions).await;
            repair = Some(RepairSummary {
                success: outcome.success,
                changes: outcome.changes,
            });
            if let Some(repaired) = outcome.steps {
                steps = repaired;
                verification = verify_solution(&simple_call, query, &skeleton, &steps).await;
            }
            metrics::record_stage_latency("repair", stage_start.elapsed());
        }

        let contents: Vec<String> = steps.iter().map(|s| s.content.clone()).collect();
        let unified = unify(&contents);
        let finalized = finalize(classification, &skeleton, &steps, &verification, retries);
        let evaluation = evaluate(&finalized.verdict, query, domain, finalized.mode);

        let latency_ms = elapsed_ms(start);
        let quality = unified_quality(
            evaluation.accuracy,
            evaluation.compliance,
            verification.score,
            latency_ms,
        );
        let verdict = if unified.unified.is_empty() {
            finalized.verdict.clone()
        } else {
            unified.unified.clone()
        };
        let confidence = finalized
            .confidence
            .min(unified.coherence)
            .max(CONFIDENCE_FLOOR);
        let violations = verification.issues.len()
            + usize::from(!math.passed)
            + usize::from(!logic.consistent);

        if let Some(memory) = &self.memory {
            memory
                .record(Trace {
                    query: query.to_string(),
                    verdict: finalized.verdict.clone(),
                    confidence: finalized.confidence,
                    mode: finalized.mode,
                    domain,
                    accuracy: evaluation.accuracy,
                    latency_ms,
                    timestamp_ms: now_ms(),
                })
                .await;
        }

        let evolution_step = self
            .evolution
            .record(PerformanceSample {
                accuracy: evaluation.accuracy,
                compliance: evaluation.compliance,
                latency_ms,
            })
            .unwrap_or_else(|e| {
                warn!(error = %e, "evolution update failed");
                None
            });

        ReasoningResult {
            verdict: verdict.clone(),
            confidence,
            mode: finalized.mode,
            domain,
            complexity: estimate_complexity(query),
            violations,
            evolution_step,
            latency_ms,
            metadata: ReasoningMetadata {
                path: ReasoningPath::Full,
                accuracy: evaluation.accuracy,
                compliance: Some(evaluation.compliance),
                quality: Some(quality),
                cache_similarity: None,
                template_version,
                audit: Some(AuditTrail {
                    verification_score: verification.score,
                    structure: structure.kind,
                    schema: formal.schema,
                    skeleton,
                    passed_checks: finalized.passed_checks,
                    failed_checks: finalized.failed_checks,
                    issues: verification.issues,
                    retries,
                    repair,
                    math,
                    logic,
                    coherence: unified.coherence,
                    removed_contradictions: unified.removed,
                    self_consistency: self_consistency(&verdict),
                    fallback_steps: solved.fallback_steps,
                    scratchpad: solved.scratchpad,
                }),
            },
        }
    }
}

fn cached_result(
    query: &str,
    classification: &Classification,
    hit: CacheHit,
    start: Instant,
    template_version: u64,
) -> ReasoningResult {
    info!(stage = "cache", similarity = hit.similarity, "cache hit");
    ReasoningResult {
        verdict: hit.trace.verdict,
        confidence: (hit.trace.confidence + CACHE_CONFIDENCE_BONUS).min(1.0),
        mode: Mode::Reflex,
        domain: classification.domain,
        complexity: estimate_complexity(query),
        violations: 0,
        evolution_step: None,
        latency_ms: elapsed_ms(start),
        metadata: ReasoningMetadata {
            path: ReasoningPath::Cached,
            accuracy: hit.trace.accuracy,
            compliance: None,
            quality: None,
            cache_similarity: Some(hit.similarity),
            template_version,
            audit: None,
        },
    }
}

fn validate_config(config: &ReasonerConfig) -> Result<(), OrchestratorError> {
    validate(config).map_err(|errors| OrchestratorError::ConfigError(summarize(&errors).to_string()))
}

// ── Orchestrator facade ──────────────────────────────────────────────────

/// Init-gated entry point: [`Orchestrator::reason`] fails with
/// [`OrchestratorError::NotInitialized`] until [`Orchestrator::init`] succeeds.
#[derive(Default)]
pub struct Orchestrator {
    reasoner: RwLock<Option<Arc<Reasoner>>>,
}

impl Orchestrator {
    /// Uninitialised facade.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a reasoner from `config` and install it, replacing any previous one.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::ConfigError`] when the config is rejected; the
    /// facade keeps its previous state.
    pub async fn init(&self, config: ReasonerConfig) -> Result<(), OrchestratorError> {
        let reasoner = Reasoner::new(config).await?;
        self.install(reasoner);
        Ok(())
    }

    /// Like [`Orchestrator::init`] with an existing provider.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::ConfigError`] when the config is rejected.
    pub async fn init_with_provider(
        &self,
        config: ReasonerConfig,
        provider: Arc<dyn Provider>,
    ) -> Result<(), OrchestratorError> {
        let reasoner = Reasoner::with_provider(config, provider).await?;
        self.install(reasoner);
        Ok(())
    }

    fn install(&self, reasoner: Reasoner) {
        let mut slot = self.reasoner.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Arc::new(reasoner));
    }

    /// Whether [`Orchestrator::init`] has succeeded.
    pub fn is_initialized(&self) -> bool {
        self.reasoner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// The installed reasoner.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::NotInitialized`] before a successful init.
    pub fn reasoner(&self) -> Result<Arc<Reasoner>, OrchestratorError> {
        self.reasoner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(OrchestratorError::NotInitialized)
    }

    /// Reason about `query` with the installed reasoner.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::NotInitialized`] before a successful init.
    pub async fn reason(&self, query: &str) -> Result<ReasoningResult, OrchestratorError> {
        let reasoner = self.reasoner()?;
        Ok(reasoner.reason(query).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderKind;

    fn config() -> ReasonerConfig {
        let mut config = ReasonerConfig::default();
        config.performance.retry_backoff_ms = 0;
        config
    }

    #[tokio::test]
    async fn test_quick_path_for_arithmetic() {
        let reasoner = Reasoner::new(config()).await.expect("test: reasoner");
        let result = reasoner.reason("What is 2 + 2?").await;
        assert_eq!(result.verdict, "4");
        assert_eq!(result.mode, Mode::Reflex);
        assert_eq!(result.domain, Domain::Math);
        assert_eq!(result.metadata.path, ReasoningPath::Quick);
        assert!((0.0..=1.0).contains(&result.confidence));
        assert!(result.metadata.audit.is_none());
    }

    #[tokio::test]
    async fn test_full_path_for_syllogism() {
        let reasoner = Reasoner::new(config()).await.expect("test: reasoner");
        let result = reasoner
            .reason("All men are mortal. Socrates is a man. Is Socrates mortal?")
            .await;
        assert_eq!(result.metadata.path, ReasoningPath::Full);
        assert_eq!(result.domain, Domain::Logic);
        assert!(result.verdict.to_lowercase().contains("mortal"));
        assert!(matches!(result.mode, Mode::Analytic | Mode::Reflective));
        assert!((0.4..=0.98).contains(&result.confidence));
        let audit = result.metadata.audit.expect("test: audit");
        assert!(audit.retries <= MAX_REPAIRS);
        assert_eq!(audit.fallback_steps, 0);
    }

    #[tokio::test]
    async fn test_network_provider_without_credentials_is_config_error() {
        let mut config = config();
        config.provider = ProviderKind::OpenAi;
        let result = Reasoner::new(config).await;
        assert!(matches!(result, Err(OrchestratorError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_orchestrator_requires_init() {
        let orchestrator = Orchestrator::new();
        assert!(!orchestrator.is_initialized());
        let result = orchestrator.reason("What is 2 + 2?").await;
        assert!(matches!(result, Err(OrchestratorError::NotInitialized)));

        orchestrator.init(config()).await.expect("test: init");
        let result = orchestrator.reason("What is 2 + 2?").await.expect("test: reason");
        assert_eq!(result.verdict, "4");
    }

    #[tokio::test]
    async fn test_failed_init_keeps_facade_uninitialised() {
        let orchestrator = Orchestrator::new();
        let mut bad = config();
        bad.performance.max_retries = 0;
        assert!(orchestrator.init(bad).await.is_err());
        assert!(!orchestrator.is_initialized());
    }

    #[test]
    fn test_reasoner_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Reasoner>();
        assert_send_sync::<Orchestrator>();
    }
}
