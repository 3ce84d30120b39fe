//! Query classification.
//!
//! The classifier is the pipeline's hard gate: it runs exactly once per
//! query, and every later stage reads its [`Classification`] by shared
//! reference. It never performs I/O and never fails; empty or malformed input
//! degrades to the lowest difficulty in the general domain.

use crate::patterns::Pattern;
use serde::{Deserialize, Serialize};
use std::fmt;

// ── Core enums ───────────────────────────────────────────────────────────

/// Coarse problem class of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    /// Short, factual, numeric.
    Simple,
    /// Anything that is not obviously simple or domain-specific.
    Complex,
    /// Paradoxes, identity, consciousness and similar abstractions.
    Abstract,
    /// Mathematical.
    Math,
    /// Logical.
    Logic,
    /// Ethical.
    Ethics,
}

impl QueryType {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Simple => "simple",
            QueryType::Complex => "complex",
            QueryType::Abstract => "abstract",
            QueryType::Math => "math",
            QueryType::Logic => "logic",
            QueryType::Ethics => "ethics",
        }
    }
}

/// Subject-matter domain of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    /// Arithmetic, algebra, analysis.
    Math,
    /// Deduction and validity.
    Logic,
    /// Cause, effect and counterfactuals.
    Causal,
    /// Existence, truth, consciousness.
    Philosophy,
    /// Moral questions.
    Ethics,
    /// No domain keywords matched.
    General,
}

impl Domain {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Math => "math",
            Domain::Logic => "logic",
            Domain::Causal => "causal",
            Domain::Philosophy => "philosophy",
            Domain::Ethics => "ethics",
            Domain::General => "general",
        }
    }
}

/// Reasoning depth tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Depth 1: answer directly.
    Reflex,
    /// Depth 2: explicit stepwise reasoning.
    Analytic,
    /// Depth 3: multi-perspective deliberation.
    Reflective,
}

impl Mode {
    /// Map a required depth onto a mode: `<=1` reflex, `2` analytic, `>=3` reflective.
    pub fn from_depth(depth: u8) -> Self {
        match depth {
            0 | 1 => Mode::Reflex,
            2 => Mode::Analytic,
            _ => Mode::Reflective,
        }
    }

    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Reflex => "reflex",
            Mode::Analytic => "analytic",
            Mode::Reflective => "reflective",
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {$(
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    )*};
}

display_as_str!(QueryType, Domain, Mode);

/// Result of classifying one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Problem class.
    pub query_type: QueryType,
    /// Difficulty on a 1..=5 ladder.
    pub difficulty: u8,
    /// Reasoning depth on a 1..=3 ladder.
    pub required_depth: u8,
    /// Subject domain.
    pub domain: Domain,
    /// When true the pipeline short-circuits to a single quick call.
    pub must_stop_reasoning: bool,
}

impl Classification {
    /// Mode implied by the required depth.
    pub fn mode(&self) -> Mode {
        Mode::from_depth(self.required_depth)
    }
}

// ── Pattern tables ───────────────────────────────────────────────────────

/// Queries with fewer tokens than this always take the quick path.
pub const SHORT_QUERY_TOKEN_FLOOR: usize = 6;

const DOMAIN_KEYWORDS: [(Domain, &[&str]); 5] = [
    (
        Domain::Math,
        &[
            "number",
            "calculate",
            "prove",
            "equation",
            "theorem",
            "integral",
            "derivative",
            "sum",
            "multiply",
        ],
    ),
    (
        Domain::Logic,
        &[
            "if",
            "then",
            "implies",
            "therefore",
            "not",
            "and",
            "or",
            "valid",
            "sound",
            "entails",
        ],
    ),
    (
        Domain::Causal,
        &[
            "cause",
            "effect",
            "because",
            "leads to",
            "results in",
            "if would",
            "counterfactual",
        ],
    ),
    (
        Domain::Philosophy,
        &[
            "exist",
            "consciousness",
            "identity",
            "truth",
            "knowledge",
            "reality",
            "being",
            "essence",
        ],
    ),
    (
        Domain::Ethics,
        &[
            "should", "ought", "moral", "ethical", "right", "wrong", "justice", "virtue", "duty",
        ],
    ),
];

static ARITHMETIC_EXPRESSION: Pattern = Pattern::new(r"\d\s*[-+*/^×÷]\s*\d");
static STRICT_ARITHMETIC: Pattern =
    Pattern::new(r"^(?:[-+]?\d+(?:\.\d+)?[-+*/^])+[-+]?\d+(?:\.\d+)?$");
static ABSTRACT_MARKERS: Pattern = Pattern::new(r"(?i)paradox|conscious|identity|abstract");
static INQUIRY_WORDS: Pattern = Pattern::new(r"(?i)why|how|prove|justify|demonstrate|show");
static META_MARKERS: Pattern = Pattern::new(r"(?i)paradox|consistency|self-modif|alignment");
static RESEARCH_MARKERS: Pattern = Pattern::new(r"(?i)research-level|open problem|formal proof");
static HARD_MATH_MARKERS: Pattern = Pattern::new(r"(?i)inequality|matrix|diophantine|integral");

// ── Classification ───────────────────────────────────────────────────────

/// Pick the domain whose keyword table has the most hits.
///
/// Ties keep the earlier table (math, logic, causal, philosophy, ethics);
/// zero hits everywhere yields [`Domain::General`].
///
/// # Panics
///
/// This function never panics.
pub fn detect_domain(query: &str) -> Domain {
    let lower = query.to_lowercase();
    let mut best = Domain::General;
    let mut best_score = 0usize;

    for (domain, keywords) in DOMAIN_KEYWORDS.iter() {
        let mut score = keywords.iter().filter(|k| lower.contains(*k)).count();
        if *domain == Domain::Math && ARITHMETIC_EXPRESSION.is_match(&lower) {
            score += 1;
        }
        if score > best_score {
            best_score = score;
            best = *domain;
        }
    }
    best
}

/// Whether the query, with all whitespace removed, is a bare arithmetic
/// expression such as `12*3` or `1.5 + -2`.
pub fn is_short_arithmetic(query: &str) -> bool {
    let compact: String = query.chars().filter(|c| !c.is_whitespace()).collect();
    STRICT_ARITHMETIC.is_match(&compact)
}

/// Classify a query.
///
/// # Panics
///
/// This function never panics.
///
/// # Example
///
/// ```rust
/// use reason_orchestrator::routing::{classify, Domain};
/// let c = classify("What is 2 + 2?");
/// assert!(c.must_stop_reasoning);
/// assert_eq!(c.domain, Domain::Math);
/// ```
pub fn classify(query: &str) -> Classification {
    let tokens = query.split_whitespace().count();
    let has_question = query.contains('?');
    let domain = detect_domain(query);

    let mut query_type = match domain {
        Domain::Math => QueryType::Math,
        Domain::Logic => QueryType::Logic,
        Domain::Ethics => QueryType::Ethics,
        _ if ABSTRACT_MARKERS.is_match(query) => QueryType::Abstract,
        _ => QueryType::Complex,
    };
    if tokens <= 8 && query.chars().any(|c| c.is_ascii_digit()) && !has_question {
        query_type = QueryType::Simple;
    }

    let mut difficulty: u8 = if tokens <= 6 { 1 } else { 2 };
    if has_question || INQUIRY_WORDS.is_match(query) {
        difficulty = difficulty.max(3);
    }
    if META_MARKERS.is_match(query) {
        difficulty = difficulty.max(4);
    }
    if RESEARCH_MARKERS.is_match(query) {
        difficulty = 5;
    }
    if domain == Domain::Math && HARD_MATH_MARKERS.is_match(query) {
        difficulty = difficulty.max(4);
    }

    let mut required_depth = match difficulty {
        0..=2 => 1,
        3 => 2,
        _ => 3,
    };
    if matches!(domain, Domain::Ethics | Domain::Philosophy) {
        required_depth = 3;
    }

    let must_stop_reasoning = is_short_arithmetic(query) || tokens < SHORT_QUERY_TOKEN_FLOOR;

    Classification {
        query_type,
        difficulty,
        required_depth,
        domain,
        must_stop_reasoning,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOCRATES: &str = "If all humans are mortal and Socrates is human, is Socrates mortal?";

    #[test]
    fn test_arithmetic_question_is_math_and_short_circuits() {
        let c = classify("What is 2 + 2?");
        assert_eq!(c.domain, Domain::Math);
        assert_eq!(c.query_type, QueryType::Math);
        assert!(c.must_stop_reasoning);
    }

    #[test]
    fn test_strict_arithmetic_grammar() {
        assert!(is_short_arithmetic("12*3"));
        assert!(is_short_arithmetic(" 1.5 + -2 "));
        assert!(is_short_arithmetic("2^10-1"));
        assert!(!is_short_arithmetic("12"));
        assert!(!is_short_arithmetic("2 + x"));
        assert!(!is_short_arithmetic("what is 2+2"));
    }

    #[test]
    fn test_long_arithmetic_expression_still_short_circuits() {
        let c = classify("1 + 2 + 3 + 4 + 5 + 6 + 7 + 8");
        assert!(c.must_stop_reasoning);
        assert_eq!(c.domain, Domain::Math);
    }

    #[test]
    fn test_short_numeric_statement_is_simple() {
        let c = classify("Compute 12 times 3");
        assert_eq!(c.query_type, QueryType::Simple);
        assert!(c.must_stop_reasoning);
    }

    #[test]
    fn test_socrates_is_logic_and_not_short_circuited() {
        let c = classify(SOCRATES);
        assert_eq!(c.domain, Domain::Logic);
        assert_eq!(c.query_type, QueryType::Logic);
        assert!(!c.must_stop_reasoning);
        assert_eq!(c.difficulty, 3);
        assert_eq!(c.mode(), Mode::Analytic);
    }

    #[test]
    fn test_ethics_forces_reflective_depth() {
        let c = classify("Is it morally right to lie to protect a friend?");
        assert_eq!(c.domain, Domain::Ethics);
        assert_eq!(c.required_depth, 3);
        assert_eq!(c.mode(), Mode::Reflective);
    }

    #[test]
    fn test_research_markers_max_difficulty() {
        let c = classify("Give a formal proof for this open problem in number theory please");
        assert_eq!(c.difficulty, 5);
        assert_eq!(c.required_depth, 3);
    }

    #[test]
    fn test_hard_math_raises_difficulty() {
        let c = classify("Calculate the integral of the given function over the unit interval");
        assert_eq!(c.domain, Domain::Math);
        assert!(c.difficulty >= 4);
    }

    #[test]
    fn test_empty_query_degrades_gracefully() {
        let c = classify("   ");
        assert_eq!(c.domain, Domain::General);
        assert_eq!(c.difficulty, 1);
        assert_eq!(c.required_depth, 1);
        assert!(c.must_stop_reasoning);
    }

    #[test]
    fn test_domain_tie_keeps_table_order() {
        // one math keyword ("sum") and one ethics keyword ("duty")
        assert_eq!(detect_domain("sum duty"), Domain::Math);
    }

    #[test]
    fn test_abstract_type_without_domain() {
        let c = classify("Tell me about the ship of Theseus paradox in some detail today");
        assert_eq!(c.query_type, QueryType::Abstract);
        assert!(c.difficulty >= 4);
    }

    #[test]
    fn test_inquiry_words_match_inside_longer_words() {
        let plain = classify("The results were fine and the margins looked thin overall");
        assert_eq!(plain.difficulty, 2);

        let however = classify("The results were fine however the margins looked thin overall");
        assert!(however.difficulty >= 3);
        let shows = classify("The chart shows the margins were thin across every region");
        assert!(shows.difficulty >= 3);
    }

    #[test]
    fn test_mode_from_depth() {
        assert_eq!(Mode::from_depth(1), Mode::Reflex);
        assert_eq!(Mode::from_depth(2), Mode::Analytic);
        assert_eq!(Mode::from_depth(3), Mode::Reflective);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(Domain::Causal.to_string(), "causal");
        assert_eq!(Mode::Reflective.to_string(), "reflective");
        assert_eq!(QueryType::Abstract.to_string(), "abstract");
    }
}
