#![allow(missing_docs)]

//! # Stage: Quality Evaluator
//! Heuristic quality signals over a response: domain accuracy, mode
//! compliance, self-consistency, plus the composite metrics the learner and
//! result metadata use. Pure functions; nothing here calls a provider.

use crate::patterns::Pattern;
use crate::routing::{Domain, Mode};
use serde::{Deserialize, Serialize};

/// Latency at which the normalised latency term saturates.
pub const LATENCY_NORMALIZER_MS: f64 = 10_000.0;

static DIGITS: Pattern = Pattern::new(r"\d+");
static LOGIC_STRUCTURE: Pattern = Pattern::new(r"(?i)step|premise|conclusion|therefore");
static LOGIC_WORDS: Pattern = Pattern::new(r"(?i)implies|entails|valid|sound");
static FRAMEWORKS: Pattern = Pattern::new(r"(?i)utilitarian|deontological|virtue|kantian");
static ANALYSIS: Pattern = Pattern::new(r"(?i)consider|perspective|argument|implication");
static STEP_MARKERS: Pattern = Pattern::new(r"(?i)step \d+|step-\d+|\[\d+\]");
static REASONING_WORDS: Pattern = Pattern::new(r"(?i)because|therefore|implies|consider");
static CONTRADICTION_WORDS: Pattern =
    Pattern::new(r"contradict|inconsistent|however, this contradicts|on the other hand");
static VERIFICATION_WORDS: Pattern = Pattern::new(r"check|verify|validate");

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub accuracy: f64,
    pub compliance: f64,
    /// `0.6 * accuracy + 0.4 * compliance`.
    pub confidence: f64,
    pub self_consistency: f64,
}

pub fn evaluate(response: &str, query: &str, domain: Domain, mode: Mode) -> Evaluation {
    let accuracy = evaluate_accuracy(response, query, domain);
    let compliance = evaluate_compliance(response, mode);
    Evaluation {
        accuracy,
        compliance,
        confidence: evaluation_confidence(accuracy, compliance),
        self_consistency: self_consistency(response),
    }
}

pub fn evaluate_accuracy(response: &str, query: &str, domain: Domain) -> f64 {
    match domain {
        Domain::Math => {
            if DIGITS.is_match(response) && DIGITS.is_match(query) {
                0.95
            } else if response.contains('=')
                || response.contains("therefore")
                || response.contains("proof")
            {
                0.85
            } else {
                0.7
            }
        }
        Domain::Logic => graded(
            LOGIC_STRUCTURE.is_match(response),
            LOGIC_WORDS.is_match(response),
            (0.9, 0.75, 0.6),
        ),
        Domain::Ethics | Domain::Philosophy => graded(
            FRAMEWORKS.is_match(response),
            ANALYSIS.is_match(response),
            (0.85, 0.7, 0.6),
        ),
        Domain::Causal | Domain::General => 0.7,
    }
}

fn graded(a: bool, b: bool, (both, either, neither): (f64, f64, f64)) -> f64 {
    match (a, b) {
        (true, true) => both,
        (true, false) | (false, true) => either,
        (false, false) => neither,
    }
}

pub fn evaluate_compliance(response: &str, mode: Mode) -> f64 {
    match mode {
        Mode::Reflex => {
            if response.len() < 300 {
                1.0
            } else {
                0.7
            }
        }
        Mode::Analytic => {
            if STEP_MARKERS.is_match(response) {
                0.95
            } else {
                0.6
            }
        }
        Mode::Reflective => {
            if response.len() > 500 && REASONING_WORDS.is_match(response) {
                0.9
            } else {
                0.65
            }
        }
    }
}

pub fn evaluation_confidence(accuracy: f64, compliance: f64) -> f64 {
    0.6 * accuracy + 0.4 * compliance
}

/// Penalises contradiction wording, rewards explicit checking.
pub fn self_consistency(text: &str) -> f64 {
    let lower = text.to_lowercase();
    let penalty = (CONTRADICTION_WORDS.count(&lower) as f64 * 0.1).min(0.5);
    let bonus = if VERIFICATION_WORDS.is_match(&lower) {
        0.05
    } else {
        0.0
    };
    (1.0 - penalty + bonus).clamp(0.0, 1.0)
}

pub fn normalized_latency(latency_ms: u64) -> f64 {
    (latency_ms as f64 / LATENCY_NORMALIZER_MS).clamp(0.0, 1.0)
}

/// `0.4A + 0.3C + 0.2(1 - T) + 0.1(1 - L)` with `L` the normalised latency.
pub fn unified_quality(accuracy: f64, compliance: f64, verification: f64, latency_ms: u64) -> f64 {
    0.4 * accuracy
        + 0.3 * compliance
        + 0.2 * (1.0 - verification)
        + 0.1 * (1.0 - normalized_latency(latency_ms))
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// `sigmoid(0.6A + 0.4S - 0.001 * latency_ms)`.
pub fn adaptive_confidence(accuracy: f64, consistency: f64, latency_ms: u64) -> f64 {
    sigmoid(0.6 * accuracy + 0.4 * consistency - 0.001 * latency_ms as f64)
}

/// `1 - e^(-3(1 - A))`: near zero for accurate runs, rising as accuracy drops.
pub fn prompt_mutation_probability(accuracy: f64) -> f64 {
    1.0 - (-3.0 * (1.0 - accuracy)).exp()
}
