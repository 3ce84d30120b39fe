//! # Stage: Memory & Cache
//!
//! ## Responsibility
//! Keep a bounded working set of completed reasoning traces, persist them
//! through a [`TraceBackend`], and answer two questions about a new query:
//! "which past traces look like this one?" and "is there a verdict good
//! enough and old enough to reuse verbatim?".
//!
//! ## Guarantees
//! - Bounded: the working set never exceeds its capacity; oldest traces are
//!   evicted first
//! - Thread-safe: appends take a short write lock, lookups read a snapshot
//! - Non-fatal: backend open, write and scan failures are logged at `warn`
//!   and never surface to the caller
//!
//! ## NOT Responsible For
//! - Deciding what to store (that belongs to `pipeline`)
//! - Embeddings beyond the character fingerprint in `intelligence::similarity`

pub mod backend;

use crate::config::MemoryConfig;
use crate::intelligence::similarity::text_similarity;
use crate::metrics;
use crate::routing::{Domain, Mode};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, info, warn};

pub use backend::{trace_key, InMemoryBackend, TraceBackend, TRACE_KEY_PREFIX};
#[cfg(feature = "persistence")]
pub use backend::SqliteTraceBackend;

/// Memory-layer failures. Only backends return these; the store logs them.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// A lock holder panicked.
    #[error("memory lock poisoned")]
    LockPoisoned,

    /// The storage engine rejected an operation.
    #[error("trace storage error: {0}")]
    Storage(String),

    /// A trace could not be (de)serialised.
    #[error("trace serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A blocking storage task was cancelled or panicked.
    #[error("storage task failed: {0}")]
    Join(String),
}

/// Milliseconds since the Unix epoch; zero if the clock is before it.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// One completed reasoning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    /// The query as submitted.
    pub query: String,
    /// The verdict returned for it.
    pub verdict: String,
    /// Confidence of the stored verdict.
    pub confidence: f64,
    /// Mode the run reported.
    pub mode: Mode,
    /// Domain of the query.
    pub domain: Domain,
    /// Evaluator accuracy of the verdict.
    pub accuracy: f64,
    /// End-to-end latency of the run.
    pub latency_ms: u64,
    /// When the run completed.
    pub timestamp_ms: u64,
}

/// The four conditions a stored trace must meet to be served from cache.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachePolicy {
    /// Minimum fingerprint cosine to the new query.
    pub min_similarity: f64,
    /// Minimum stored accuracy.
    pub min_accuracy: f64,
    /// Minimum stored confidence.
    pub min_confidence: f64,
    /// The trace must be strictly older than this.
    pub freshness_ms: u64,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            min_similarity: 0.9,
            min_accuracy: 0.85,
            min_confidence: 0.8,
            freshness_ms: 2_000,
        }
    }
}

impl From<&MemoryConfig> for CachePolicy {
    fn from(config: &MemoryConfig) -> Self {
        Self {
            min_similarity: config.similarity_threshold,
            min_accuracy: config.min_accuracy,
            min_confidence: config.min_confidence,
            freshness_ms: config.freshness_ms,
        }
    }
}

impl CachePolicy {
    /// Whether `trace`, at `similarity` to the query, may be reused at `now_ms`.
    pub fn admits(&self, trace: &Trace, similarity: f64, now_ms: u64) -> bool {
        similarity >= self.min_similarity
            && trace.accuracy >= self.min_accuracy
            && trace.confidence >= self.min_confidence
            && now_ms.saturating_sub(trace.timestamp_ms) > self.freshness_ms
    }
}

/// A trace served from cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit {
    /// The reused trace.
    pub trace: Trace,
    /// Its similarity to the new query.
    pub similarity: f64,
}

/// Snapshot of the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    /// Traces currently in the working set.
    pub total_traces: usize,
    /// Mean confidence over the working set (0 when empty).
    pub avg_confidence: f64,
    /// Mean latency over the working set (0 when empty).
    pub avg_latency_ms: f64,
    /// Cache lookups that returned a hit.
    pub cache_hits: u64,
    /// Cache lookups that did not.
    pub cache_misses: u64,
}

/// Bounded, optionally persisted trace store.
pub struct TraceStore {
    traces: RwLock<VecDeque<Trace>>,
    capacity: usize,
    policy: CachePolicy,
    backend: Option<Arc<dyn TraceBackend>>,
    seq: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl TraceStore {
    /// Store with no persistence.
    pub fn new(capacity: usize, policy: CachePolicy) -> Self {
        Self {
            traces: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
            policy,
            backend: None,
            seq: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Store persisting through `backend`. Call [`TraceStore::rehydrate`] to
    /// load what the backend already holds.
    pub fn with_backend(capacity: usize, policy: CachePolicy, backend: Arc<dyn TraceBackend>) -> Self {
        Self {
            backend: Some(backend),
            ..Self::new(capacity, policy)
        }
    }

    /// Build the store described by `config`, opening the SQLite backend at
    /// `config.path` when persistence is compiled in, and rehydrating from it.
    /// An unopenable database degrades to an in-memory store.
    pub async fn open(config: &MemoryConfig) -> Self {
        let policy = CachePolicy::from(config);
        #[cfg(feature = "persistence")]
        {
            match SqliteTraceBackend::open(&config.path).await {
                Ok(backend) => {
                    let store = Self::with_backend(config.capacity, policy, Arc::new(backend));
                    store.rehydrate().await;
                    return store;
                }
                Err(e) => {
                    warn!(path = %config.path, error = %e, "trace store unavailable, memory is not persisted");
                }
            }
        }
        Self::new(config.capacity, policy)
    }

    /// The cache policy in force.
    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Load the most recent `capacity` traces from the backend. Returns how
    /// many were loaded.
    pub async fn rehydrate(&self) -> usize {
        let Some(backend) = &self.backend else {
            return 0;
        };
        let scanned = match backend.scan().await {
            Ok(scanned) => scanned,
            Err(e) => {
                warn!(error = %e, "trace rehydration failed");
                return 0;
            }
        };
        let skip = scanned.len().saturating_sub(self.capacity);
        let mut traces = self.traces.write().unwrap_or_else(PoisonError::into_inner);
        traces.clear();
        traces.extend(scanned.into_iter().skip(skip).map(|(_, trace)| trace));
        let loaded = traces.len();
        info!(loaded, "trace store rehydrated");
        loaded
    }

    /// Append a trace, evicting the oldest when full, then persist it.
    pub async fn record(&self, trace: Trace) {
        let key = trace_key(trace.timestamp_ms, self.seq.fetch_add(1, Ordering::Relaxed));
        {
            let mut traces = self.traces.write().unwrap_or_else(PoisonError::into_inner);
            while traces.len() >= self.capacity {
                traces.pop_front();
            }
            traces.push_back(trace.clone());
        }
        if let Some(backend) = &self.backend {
            if let Err(e) = backend.append(&key, &trace).await {
                warn!(key = %key, error = %e, "trace write failed");
            }
        }
        debug!(key = %key, "trace recorded");
    }

    fn snapshot(&self) -> Vec<Trace> {
        self.traces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Top `k` traces by fingerprint cosine to `query`, most similar first.
    pub fn similar(&self, query: &str, k: usize) -> Vec<(Trace, f64)> {
        let mut scored: Vec<(Trace, f64)> = self
            .snapshot()
            .into_iter()
            .map(|trace| {
                let sim = text_similarity(query, &trace.query);
                (trace, sim)
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);
        scored
    }

    /// Cache lookup against the wall clock.
    pub fn cache_lookup(&self, query: &str) -> Option<CacheHit> {
        self.cache_lookup_at(query, now_ms())
    }

    /// Cache lookup at an explicit time: only the single most similar trace
    /// is considered, and it must pass every [`CachePolicy`] condition.
    pub fn cache_lookup_at(&self, query: &str, now_ms: u64) -> Option<CacheHit> {
        let hit = self
            .similar(query, 1)
            .into_iter()
            .next()
            .filter(|(trace, sim)| self.policy.admits(trace, *sim, now_ms))
            .map(|(trace, similarity)| CacheHit { trace, similarity });

        if hit.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        metrics::record_cache_lookup(hit.is_some());
        hit
    }

    /// Planning context from the three most similar traces, or an empty
    /// string when the store is empty.
    pub fn context_for(&self, query: &str) -> String {
        let similar = self.similar(query, 3);
        if similar.is_empty() {
            return String::new();
        }
        let lines = similar
            .iter()
            .enumerate()
            .map(|(i, (t, _))| format!("{}. {} -> {}", i + 1, t.query, t.verdict))
            .collect::<Vec<_>>()
            .join("\n");
        format!("Similar past reasoning:\n{lines}")
    }

    /// Traces in the working set.
    pub fn len(&self) -> usize {
        self.traces.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the working set is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Aggregate view of the working set and lookup counters.
    pub fn stats(&self) -> MemoryStats {
        let traces = self.traces.read().unwrap_or_else(PoisonError::into_inner);
        let n = traces.len();
        let (conf, lat) = traces.iter().fold((0.0, 0.0), |(c, l), t| {
            (c + t.confidence, l + t.latency_ms as f64)
        });
        let mean = |sum: f64| if n == 0 { 0.0 } else { sum / n as f64 };
        MemoryStats {
            total_traces: n,
            avg_confidence: mean(conf),
            avg_latency_ms: mean(lat),
            cache_hits: self.hits.load(Ordering::Relaxed),
            cache_misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
