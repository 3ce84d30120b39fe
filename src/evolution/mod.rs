//! # Stage: Template Evolution
//!
//! ## Responsibility
//! Watch a sliding window of per-run performance samples and, when the
//! window's weighted shortfall crosses a threshold, publish a mutated set of
//! mode templates that nudges future prompts toward what was lacking.
//!
//! ## Guarantees
//! - Atomic: appending a sample and (maybe) firing a step happen under one
//!   lock, so concurrent runs never double-fire on the same window
//! - Idempotent mutations: a clause is never appended to a template twice
//! - Append-only history: every step publishes a new template version; old
//!   versions stay readable in the registry
//!
//! ## NOT Responsible For
//! - Computing sample scores (that belongs to `intelligence::quality`)
//! - Routing thresholds (classification is fixed; only templates evolve)

use crate::config::EvolutionConfig;
use crate::intelligence::templates::{ModeTemplates, TemplateError, TemplateRegistry};
use crate::metrics;
use crate::routing::Mode;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info};

/// Window accuracy below which the analytic and reflective templates are tightened.
pub const ACCURACY_FLOOR: f64 = 0.8;
/// Window compliance below which the reflex and analytic templates are shortened.
pub const COMPLIANCE_FLOOR: f64 = 0.85;
/// Window latency above which the reflective template is told to be succinct.
pub const LATENCY_CEILING_MS: f64 = 1500.0;

const STEPWISE_CLAUSE: &str = "Use numbered, atomic steps and check each step.";
const ALTERNATIVES_CLAUSE: &str = "Map alternatives; justify the final choice explicitly.";
const BREVITY_CLAUSE: &str = "Keep under 2 sentences unless clarification is required.";
const MINIMAL_STEPS_CLAUSE: &str = "Limit to the minimal steps necessary.";
const SUCCINCT_CLAUSE: &str = "Be succinct; prefer bullets over paragraphs.";

/// Evolution failures.
#[derive(Debug, Error)]
pub enum EvolutionError {
    /// A holder of the window lock panicked.
    #[error("evolution state lock poisoned")]
    LockPoisoned,

    /// Publishing the mutated templates failed.
    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// Per-run performance signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSample {
    /// Evaluator accuracy.
    pub accuracy: f64,
    /// Evaluator mode compliance.
    pub compliance: f64,
    /// End-to-end latency.
    pub latency_ms: u64,
}

/// Window averages that triggered (or would trigger) a step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowAverages {
    /// Mean accuracy.
    pub accuracy: f64,
    /// Mean compliance.
    pub compliance: f64,
    /// Mean latency.
    pub latency_ms: f64,
}

impl WindowAverages {
    fn of(window: &VecDeque<PerformanceSample>) -> Self {
        let n = window.len().max(1) as f64;
        let (a, c, l) = window.iter().fold((0.0, 0.0, 0.0), |(a, c, l), s| {
            (a + s.accuracy, c + s.compliance, l + s.latency_ms as f64)
        });
        Self {
            accuracy: a / n,
            compliance: c / n,
            latency_ms: l / n,
        }
    }
}

/// Snapshot of the learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionStats {
    /// Steps fired so far.
    pub evolution_count: u64,
    /// Samples in the current window, oldest first.
    pub window: Vec<PerformanceSample>,
}

struct EvolutionState {
    counter: u64,
    window: VecDeque<PerformanceSample>,
}

/// Sliding-window template learner.
pub struct EvolutionEngine {
    config: EvolutionConfig,
    state: Mutex<EvolutionState>,
    templates: Arc<TemplateRegistry>,
}

/// `alpha(1 - acc) + beta(1 - comp) + gamma * latency_ms`.
pub fn evolution_delta(config: &EvolutionConfig, averages: &WindowAverages) -> f64 {
    config.alpha * (1.0 - averages.accuracy)
        + config.beta * (1.0 - averages.compliance)
        + config.gamma * averages.latency_ms
}

/// Templates with the clauses the averages call for. Returns `None` when no
/// rule applies.
pub fn mutate_templates(current: &ModeTemplates, averages: &WindowAverages) -> Option<ModeTemplates> {
    let mut clauses: Vec<(Mode, &str)> = Vec::new();
    if averages.accuracy < ACCURACY_FLOOR {
        clauses.push((Mode::Analytic, STEPWISE_CLAUSE));
        clauses.push((Mode::Reflective, ALTERNATIVES_CLAUSE));
    }
    if averages.compliance < COMPLIANCE_FLOOR {
        clauses.push((Mode::Reflex, BREVITY_CLAUSE));
        clauses.push((Mode::Analytic, MINIMAL_STEPS_CLAUSE));
    }
    if averages.latency_ms > LATENCY_CEILING_MS {
        clauses.push((Mode::Reflective, SUCCINCT_CLAUSE));
    }
    if clauses.is_empty() {
        return None;
    }
    Some(
        clauses
            .into_iter()
            .fold(current.clone(), |t, (mode, clause)| t.with_clause(mode, clause)),
    )
}

impl EvolutionEngine {
    /// Learner mutating `templates`.
    pub fn new(config: EvolutionConfig, templates: Arc<TemplateRegistry>) -> Self {
        let capacity = config.window.max(1);
        Self {
            config,
            state: Mutex::new(EvolutionState {
                counter: 0,
                window: VecDeque::with_capacity(capacity),
            }),
            templates,
        }
    }

    /// The registry this learner mutates.
    pub fn templates(&self) -> &Arc<TemplateRegistry> {
        &self.templates
    }

    /// Append a sample; when the window is full and its delta exceeds theta,
    /// fire a step. Returns the new step number only when one fired.
    ///
    /// # Errors
    ///
    /// [`EvolutionError::LockPoisoned`] or a template publish failure.
    pub fn record(&self, sample: PerformanceSample) -> Result<Option<u64>, EvolutionError> {
        let capacity = self.config.window.max(1);
        let mut state = self.state.lock().map_err(|_| EvolutionError::LockPoisoned)?;

        state.window.push_back(sample);
        while state.window.len() > capacity {
            state.window.pop_front();
        }
        if state.window.len() < capacity {
            return Ok(None);
        }

        let averages = WindowAverages::of(&state.window);
        let delta = evolution_delta(&self.config, &averages);
        debug!(delta, theta = self.config.theta, "evolution window full");
        if delta <= self.config.theta {
            return Ok(None);
        }

        state.counter += 1;
        state.window.clear();
        let step = state.counter;

        if let Some(next) = mutate_templates(&self.templates.active().templates, &averages) {
            let reason = format!(
                "evolution step {step}: accuracy {:.2}, compliance {:.2}, latency {:.0}ms",
                averages.accuracy, averages.compliance, averages.latency_ms
            );
            let version = self.templates.publish(next, reason)?;
            info!(step, version, delta, "templates evolved");
        } else {
            info!(step, delta, "evolution step fired with no applicable mutation");
        }
        metrics::record_evolution(step);
        Ok(Some(step))
    }

    /// Counter and window snapshot. A poisoned lock yields an empty snapshot.
    pub fn stats(&self) -> EvolutionStats {
        match self.state.lock() {
            Ok(state) => EvolutionStats {
                evolution_count: state.counter,
                window: state.window.iter().copied().collect(),
            },
            Err(_) => EvolutionStats {
                evolution_count: 0,
                window: Vec::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(accuracy: f64, compliance: f64, latency_ms: u64) -> PerformanceSample {
        PerformanceSample {
            accuracy,
            compliance,
            latency_ms,
        }
    }

    fn engine() -> EvolutionEngine {
        EvolutionEngine::new(EvolutionConfig::default(), Arc::new(TemplateRegistry::new()))
    }

    #[test]
    fn test_fires_exactly_once_on_tenth_low_sample() {
        let engine = engine();
        for i in 1..=9 {
            assert_eq!(
                engine.record(sample(0.5, 0.5, 100)).expect("test: record"),
                None,
                "sample {i} fired early"
            );
        }
        assert_eq!(engine.record(sample(0.5, 0.5, 100)).expect("test: record"), Some(1));

        let stats = engine.stats();
        assert_eq!(stats.evolution_count, 1);
        assert!(stats.window.is_empty());
    }

    #[test]
    fn test_good_samples_never_fire_and_window_slides() {
        let engine = engine();
        for _ in 0..25 {
            assert_eq!(engine.record(sample(1.0, 1.0, 0)).expect("test: record"), None);
        }
        let stats = engine.stats();
        assert_eq!(stats.evolution_count, 0);
        assert_eq!(stats.window.len(), 10);
    }

    #[test]
    fn test_step_publishes_mutated_templates() {
        let engine = engine();
        for _ in 0..10 {
            engine.record(sample(0.5, 0.5, 2_000)).expect("test: record");
        }
        let registry = engine.templates();
        assert_eq!(registry.versions().len(), 2);
        let active = registry.active();
        assert!(active.templates.analytic.contains(STEPWISE_CLAUSE));
        assert!(active.templates.analytic.contains(MINIMAL_STEPS_CLAUSE));
        assert!(active.templates.reflex.contains(BREVITY_CLAUSE));
        assert!(active.templates.reflective.contains(ALTERNATIVES_CLAUSE));
        assert!(active.templates.reflective.contains(SUCCINCT_CLAUSE));
    }

    #[test]
    fn test_clauses_are_not_duplicated() {
        let engine = engine();
        for _ in 0..20 {
            engine.record(sample(0.5, 1.0, 0)).expect("test: record");
        }
        assert_eq!(engine.stats().evolution_count, 2);
        let analytic = engine.templates().active().templates.analytic.clone();
        assert_eq!(analytic.matches(STEPWISE_CLAUSE).count(), 1);
    }

    #[test]
    fn test_delta_formula() {
        let config = EvolutionConfig::default();
        let averages = WindowAverages {
            accuracy: 0.5,
            compliance: 0.5,
            latency_ms: 100.0,
        };
        assert!((evolution_delta(&config, &averages) - (0.2 + 0.15 + 0.1)).abs() < 1e-9);
    }

    #[test]
    fn test_latency_alone_can_fire() {
        let engine = engine();
        let mut fired = None;
        for _ in 0..10 {
            fired = engine.record(sample(1.0, 1.0, 2_000)).expect("test: record");
        }
        assert_eq!(fired, Some(1));
        let active = engine.templates().active();
        assert!(active.templates.reflective.contains(SUCCINCT_CLAUSE));
        assert!(!active.templates.analytic.contains(STEPWISE_CLAUSE));
    }
}
