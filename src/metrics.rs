//! Prometheus metrics for the reasoning pipeline.
//!
//! ## Usage
//!
//! Call [`init_metrics`] once at process startup. The recording helpers
//! (`record_stage_latency`, `inc_run`, …) are no-ops until then, so the
//! pipeline is always safe to run and observability simply degrades. Every
//! helper also emits a `debug!` event carrying a `metric` field, so the same
//! signals are visible in the log stream without a scrape endpoint.
//!
//! ## Metrics Exposed
//!
//! | Name | Type | Labels |
//! |------|------|--------|
//! | `reasoner_runs_total` | Counter | `path` |
//! | `reasoner_stage_duration_seconds` | Histogram | `stage` |
//! | `reasoner_cache_lookups_total` | Counter | `outcome` |
//! | `reasoner_repairs_total` | Counter | `outcome` |
//! | `reasoner_provider_errors_total` | Counter | `stage` |
//! | `reasoner_evolution_steps_total` | Counter | none |

use crate::OrchestratorError;
use prometheus::{
    core::Collector, CounterVec, Encoder, HistogramOpts, HistogramVec, IntCounter, Opts, Registry,
    TextEncoder,
};
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;

// ── Internal metrics bundle ────────────────────────────────────────────────

/// All pipeline metrics, stored in a single [`OnceLock`] and initialised
/// atomically.
pub struct Metrics {
    /// Private registry owning every descriptor below.
    pub registry: Registry,
    /// Completed runs per path (`quick`, `cached`, `full`).
    pub runs_total: CounterVec,
    /// Stage latency histogram.
    pub stage_duration: HistogramVec,
    /// Cache lookups by outcome (`hit`, `miss`).
    pub cache_lookups: CounterVec,
    /// Repair passes by outcome (`accepted`, `rejected`).
    pub repairs_total: CounterVec,
    /// Provider failures per calling stage.
    pub provider_errors: CounterVec,
    /// Evolution steps fired.
    pub evolution_steps: IntCounter,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

fn register<C>(registry: &Registry, collector: C) -> Result<C, OrchestratorError>
where
    C: Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|e| OrchestratorError::Other(format!("metrics registration failed: {e}")))?;
    Ok(collector)
}

fn counter_vec(name: &str, help: &str, label: &str) -> Result<CounterVec, OrchestratorError> {
    CounterVec::new(Opts::new(name, help), &[label])
        .map_err(|e| OrchestratorError::Other(format!("metrics init failed: {e}")))
}

fn build_metrics(prefix: &str) -> Result<Metrics, OrchestratorError> {
    let registry = Registry::new();
    let name = |suffix: &str| format!("{prefix}_{suffix}");

    let runs_total = register(
        &registry,
        counter_vec(&name("runs_total"), "Completed reasoning runs", "path")?,
    )?;
    let stage_duration = register(
        &registry,
        HistogramVec::new(
            HistogramOpts::new(name("stage_duration_seconds"), "Duration per pipeline stage"),
            &["stage"],
        )
        .map_err(|e| OrchestratorError::Other(format!("metrics init failed: {e}")))?,
    )?;
    let cache_lookups = register(
        &registry,
        counter_vec(&name("cache_lookups_total"), "Memory cache lookups", "outcome")?,
    )?;
    let repairs_total = register(
        &registry,
        counter_vec(&name("repairs_total"), "Repair passes", "outcome")?,
    )?;
    let provider_errors = register(
        &registry,
        counter_vec(&name("provider_errors_total"), "Provider call failures", "stage")?,
    )?;
    let evolution_steps = register(
        &registry,
        IntCounter::new(name("evolution_steps_total"), "Evolution steps fired")
            .map_err(|e| OrchestratorError::Other(format!("metrics init failed: {e}")))?,
    )?;

    Ok(Metrics {
        registry,
        runs_total,
        stage_duration,
        cache_lookups,
        repairs_total,
        provider_errors,
        evolution_steps,
    })
}

// ── Initialisation ─────────────────────────────────────────────────────────

/// Initialise the pipeline metrics in a private registry.
///
/// Calling it a second time is a no-op (returns `Ok(())`).
///
/// # Errors
///
/// Returns [`OrchestratorError::Other`] if metric construction or
/// registration fails.
///
/// # Panics
///
/// This function never panics.
pub fn init_metrics() -> Result<(), OrchestratorError> {
    if METRICS.get().is_some() {
        return Ok(());
    }
    let bundle = build_metrics("reasoner")?;
    // A racing initialiser builds identical descriptors; whichever lands first wins.
    let _ = METRICS.set(bundle);
    Ok(())
}

fn metrics() -> Option<&'static Metrics> {
    METRICS.get()
}

// ── Recording helpers ──────────────────────────────────────────────────────

/// Record the latency of one pipeline stage.
///
/// # Panics
///
/// This function never panics.
pub fn record_stage_latency(stage: &str, d: Duration) {
    debug!(metric = "stage_latency", stage = stage, ms = d.as_millis() as u64);
    if let Some(m) = metrics() {
        if let Ok(h) = m.stage_duration.get_metric_with_label_values(&[stage]) {
            h.observe(d.as_secs_f64());
        }
    }
}

/// Count a completed run on `path`.
///
/// # Panics
///
/// This function never panics.
pub fn inc_run(path: &str) {
    debug!(metric = "run", path = path);
    if let Some(m) = metrics() {
        if let Ok(c) = m.runs_total.get_metric_with_label_values(&[path]) {
            c.inc();
        }
    }
}

/// Count a cache lookup.
///
/// # Panics
///
/// This function never panics.
pub fn record_cache_lookup(hit: bool) {
    let outcome = if hit { "hit" } else { "miss" };
    debug!(metric = "cache_lookup", outcome = outcome);
    if let Some(m) = metrics() {
        if let Ok(c) = m.cache_lookups.get_metric_with_label_values(&[outcome]) {
            c.inc();
        }
    }
}

/// Count a repair pass.
///
/// # Panics
///
/// This function never panics.
pub fn record_repair(accepted: bool) {
    let outcome = if accepted { "accepted" } else { "rejected" };
    debug!(metric = "repair", outcome = outcome);
    if let Some(m) = metrics() {
        if let Ok(c) = m.repairs_total.get_metric_with_label_values(&[outcome]) {
            c.inc();
        }
    }
}

/// Count a failed provider call made by `stage`.
///
/// # Panics
///
/// This function never panics.
pub fn inc_provider_error(stage: &str) {
    debug!(metric = "provider_error", stage = stage);
    if let Some(m) = metrics() {
        if let Ok(c) = m.provider_errors.get_metric_with_label_values(&[stage]) {
            c.inc();
        }
    }
}

/// Count a fired evolution step.
///
/// # Panics
///
/// This function never panics.
pub fn record_evolution(step: u64) {
    debug!(metric = "evolution_step", step = step);
    if let Some(m) = metrics() {
        m.evolution_steps.inc();
    }
}

// ── Export ─────────────────────────────────────────────────────────────────

/// Encode all metrics in the Prometheus text exposition format.
///
/// Returns an empty string if metrics have not been initialised or encoding
/// fails.
///
/// # Panics
///
/// This function never panics.
pub fn gather_metrics() -> String {
    let Some(m) = metrics() else {
        return String::new();
    };
    encode(&m.registry)
}

fn encode(registry: &Registry) -> String {
    let families = registry.gather();
    let mut buffer = Vec::new();
    if TextEncoder::new().encode(&families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Counter snapshot keyed by label value.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MetricsSummary {
    /// Runs per path.
    pub runs: HashMap<String, u64>,
    /// Cache lookups per outcome.
    pub cache_lookups: HashMap<String, u64>,
    /// Repairs per outcome.
    pub repairs: HashMap<String, u64>,
    /// Evolution steps fired.
    pub evolution_steps: u64,
}

fn by_label(counter: &CounterVec, label: &str) -> HashMap<String, u64> {
    let mut out = HashMap::new();
    for family in counter.collect() {
        for metric in family.get_metric() {
            let key = metric
                .get_label()
                .iter()
                .find(|l| l.get_name() == label)
                .map_or("unknown", |l| l.get_value());
            out.insert(key.to_string(), metric.get_counter().get_value() as u64);
        }
    }
    out
}

fn summarize(m: &Metrics) -> MetricsSummary {
    MetricsSummary {
        runs: by_label(&m.runs_total, "path"),
        cache_lookups: by_label(&m.cache_lookups, "outcome"),
        repairs: by_label(&m.repairs_total, "outcome"),
        evolution_steps: m.evolution_steps.get(),
    }
}

/// Current counter values; zeroed before [`init_metrics`].
///
/// # Panics
///
/// This function never panics.
pub fn get_metrics_summary() -> MetricsSummary {
    metrics().map(summarize).unwrap_or_default()
}
