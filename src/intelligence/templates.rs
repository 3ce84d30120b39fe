//! # Stage: Prompt Template Registry
//!
//! ## Responsibility
//! Hold the per-mode system templates used to frame provider prompts, as a
//! versioned, append-only history. The evolution engine publishes a new
//! immutable version whenever it mutates the templates; readers always see
//! one consistent version.
//!
//! ## Guarantees
//! - Append-only: published versions are never modified or removed
//! - Atomic: publishing swaps the active pointer under a single write lock
//! - Total: prompt building never fails; a poisoned lock degrades to the last
//!   consistent state
//!
//! ## NOT Responsible For
//! - Deciding when or how to mutate (that belongs to `evolution`)
//! - Persisting versions across restarts

use crate::intelligence::similarity::{cosine_similarity, vectorize};
use crate::patterns::Pattern;
use crate::routing::{Domain, Mode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tracing::{debug, info};

const DEFAULT_REFLEX: &str =
    "Answer precisely with no reasoning unless ambiguity exists. Be direct and concise.";
const DEFAULT_ANALYTIC: &str = "Reason step-by-step. Label each step as [Step 1], [Step 2], etc. Show your logical progression.";
const DEFAULT_REFLECTIVE: &str = "Analyze implications, ethics, and causal outcomes. Use logic trees. Consider multiple perspectives before concluding.";

/// Errors from the template registry.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The registry lock was poisoned by a panicking writer.
    #[error("template registry lock poisoned")]
    LockPoisoned,
    /// No published version has this number.
    #[error("unknown template version {0}")]
    UnknownVersion(u64),
    /// Seed file could not be read.
    #[error("failed to read prompt seeds from {path}: {source}")]
    SeedIo {
        /// Path of the seed file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Seed file is not valid JSON.
    #[error("failed to parse prompt seeds: {0}")]
    SeedParse(#[from] serde_json::Error),
}

/// Domain-specific guidance appended after the mode template.
pub fn domain_enhancement(domain: Domain) -> &'static str {
    match domain {
        Domain::Math => "Use symbolic notation. Show algebraic steps. Verify results.",
        Domain::Logic => "Identify premises. Apply inference rules. Check validity.",
        Domain::Causal => {
            "Map cause-effect chains. Check temporal ordering. Consider counterfactuals."
        }
        Domain::Philosophy => "Define terms. Consider multiple frameworks. Address paradoxes.",
        Domain::Ethics => {
            "Apply utilitarian, deontological, and virtue ethics frameworks. Balance competing values."
        }
        Domain::General => "",
    }
}

// ── Templates ────────────────────────────────────────────────────────────

/// One system template per reasoning mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeTemplates {
    /// Depth-1 template.
    pub reflex: String,
    /// Depth-2 template.
    pub analytic: String,
    /// Depth-3 template.
    pub reflective: String,
}

impl Default for ModeTemplates {
    fn default() -> Self {
        Self {
            reflex: DEFAULT_REFLEX.to_string(),
            analytic: DEFAULT_ANALYTIC.to_string(),
            reflective: DEFAULT_REFLECTIVE.to_string(),
        }
    }
}

impl ModeTemplates {
    /// Template text for a mode.
    pub fn for_mode(&self, mode: Mode) -> &str {
        match mode {
            Mode::Reflex => &self.reflex,
            Mode::Analytic => &self.analytic,
            Mode::Reflective => &self.reflective,
        }
    }

    /// Copy with `clause` appended to the mode's template, unless the
    /// template already contains it.
    pub fn with_clause(&self, mode: Mode, clause: &str) -> Self {
        let mut next = self.clone();
        let slot = match mode {
            Mode::Reflex => &mut next.reflex,
            Mode::Analytic => &mut next.analytic,
            Mode::Reflective => &mut next.reflective,
        };
        if !slot.contains(clause) {
            slot.push(' ');
            slot.push_str(clause);
        }
        next
    }
}

/// An immutable published set of templates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateVersion {
    /// Monotonic version number; the built-in defaults are version 0.
    pub version: u64,
    /// Templates of this version.
    pub templates: ModeTemplates,
    /// Why this version was published.
    pub reason: String,
}

// ── Prompt seeds ─────────────────────────────────────────────────────────

static MATH_HINT: Pattern = Pattern::new(r"math|graph|number|proof|series|limit|geometry");
static LOGIC_HINT: Pattern = Pattern::new(r"logic|syllogism|paradox|quantifier|contradiction");
static ETHICS_HINT: Pattern = Pattern::new(r"ethic|moral|trolley|fair");
static CAUSAL_HINT: Pattern = Pattern::new(r"cause|causal|counterfactual|dag");
static PHILOSOPHY_HINT: Pattern = Pattern::new(r"identity|philos|ontology|metaphys|conscious");
static NOW_ANSWER: Pattern = Pattern::new(r"(?i)now answer:");

/// A reusable system-prompt preamble selected per query.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptSeed {
    /// Seed identifier.
    pub id: String,
    /// Human-readable title.
    pub title: String,
    /// System text prepended to the mode template.
    pub system: String,
    tokens: Vec<String>,
    vector: Vec<f64>,
    /// Domains this seed is suited for.
    pub domain_hints: Vec<Domain>,
}

#[derive(Debug, Deserialize)]
struct RawSeed {
    id: Option<String>,
    title: Option<String>,
    system: Option<String>,
}

fn alnum_tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

impl PromptSeed {
    fn from_raw(raw: RawSeed) -> Option<Self> {
        let raw_system = raw.system?.trim().to_string();
        // Seeds may embed a trailing "Now answer:" slot; keep only the preamble.
        let system = match NOW_ANSWER.regex().and_then(|re| re.find(&raw_system)) {
            Some(m) => raw_system[..m.start()].trim().to_string(),
            None => raw_system,
        };
        let title = raw
            .title
            .or_else(|| raw.id.clone())
            .unwrap_or_else(|| "seed".to_string());
        let combined = format!("{title} {system}").to_lowercase();

        let mut domain_hints = Vec::new();
        for (pattern, domain) in [
            (&MATH_HINT, Domain::Math),
            (&LOGIC_HINT, Domain::Logic),
            (&ETHICS_HINT, Domain::Ethics),
            (&CAUSAL_HINT, Domain::Causal),
            (&PHILOSOPHY_HINT, Domain::Philosophy),
        ] {
            if pattern.is_match(&combined) {
                domain_hints.push(domain);
            }
        }
        if domain_hints.is_empty() {
            domain_hints.push(Domain::General);
        }

        Some(Self {
            id: raw.id.unwrap_or_else(|| "seed".to_string()),
            title,
            vector: vectorize(&system),
            tokens: alnum_tokens(&combined),
            system,
            domain_hints,
        })
    }

    /// Relevance of this seed to a query: token overlap, fingerprint
    /// similarity and a domain boost.
    pub fn score(&self, query: &str, domain: Domain) -> f64 {
        let query_tokens = alnum_tokens(&query.to_lowercase());
        let overlap = self
            .tokens
            .iter()
            .filter(|t| query_tokens.contains(t))
            .count() as f64;
        let sim = cosine_similarity(&vectorize(query), &self.vector);
        let boost = if self.domain_hints.contains(&domain) {
            0.3
        } else {
            0.0
        };
        overlap * 0.05 + sim + boost
    }
}

/// Parse prompt seeds from a JSON array of `{id, title, system}` records.
///
/// Records without a string `system` field are skipped; a JSON value that is
/// not an array yields no seeds.
///
/// # Errors
///
/// [`TemplateError::SeedParse`] when the text is not JSON.
pub fn parse_seeds(json: &str) -> Result<Vec<PromptSeed>, TemplateError> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    let serde_json::Value::Array(records) = value else {
        return Ok(Vec::new());
    };
    Ok(records
        .into_iter()
        .filter_map(|record| serde_json::from_value::<RawSeed>(record).ok())
        .filter_map(PromptSeed::from_raw)
        .collect())
}

/// Load prompt seeds from a JSON file.
///
/// # Errors
///
/// [`TemplateError::SeedIo`] or [`TemplateError::SeedParse`].
pub fn load_seeds(path: &Path) -> Result<Vec<PromptSeed>, TemplateError> {
    let content = std::fs::read_to_string(path).map_err(|e| TemplateError::SeedIo {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_seeds(&content)
}

// ── Registry ─────────────────────────────────────────────────────────────

struct RegistryInner {
    versions: Vec<Arc<TemplateVersion>>,
    active: usize,
}

/// Versioned, append-only store of mode templates.
pub struct TemplateRegistry {
    inner: RwLock<RegistryInner>,
    seeds: Vec<PromptSeed>,
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRegistry {
    /// Registry holding only the built-in defaults as version 0.
    pub fn new() -> Self {
        Self::with_seeds(Vec::new())
    }

    /// Registry with prompt seeds available for preamble selection.
    pub fn with_seeds(seeds: Vec<PromptSeed>) -> Self {
        let initial = Arc::new(TemplateVersion {
            version: 0,
            templates: ModeTemplates::default(),
            reason: "built-in defaults".to_string(),
        });
        Self {
            inner: RwLock::new(RegistryInner {
                versions: vec![initial],
                active: 0,
            }),
            seeds,
        }
    }

    /// The currently active version.
    pub fn active(&self) -> Arc<TemplateVersion> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&inner.versions[inner.active])
    }

    /// Every published version, oldest first.
    pub fn versions(&self) -> Vec<Arc<TemplateVersion>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.versions.clone()
    }

    /// Publish a new immutable version and make it active.
    ///
    /// # Errors
    ///
    /// [`TemplateError::LockPoisoned`] if a writer panicked while holding the lock.
    pub fn publish(
        &self,
        templates: ModeTemplates,
        reason: impl Into<String>,
    ) -> Result<u64, TemplateError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| TemplateError::LockPoisoned)?;
        let version = inner.versions.len() as u64;
        inner.versions.push(Arc::new(TemplateVersion {
            version,
            templates,
            reason: reason.into(),
        }));
        inner.active = inner.versions.len() - 1;
        info!(version = version, "template version published");
        Ok(version)
    }

    /// Point the registry back at an earlier (or later) published version.
    ///
    /// # Errors
    ///
    /// [`TemplateError::UnknownVersion`] or [`TemplateError::LockPoisoned`].
    pub fn activate(&self, version: u64) -> Result<(), TemplateError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| TemplateError::LockPoisoned)?;
        let idx = usize::try_from(version)
            .ok()
            .filter(|idx| *idx < inner.versions.len())
            .ok_or(TemplateError::UnknownVersion(version))?;
        inner.active = idx;
        Ok(())
    }

    /// Best-scoring seed for a query, if any seeds are loaded.
    pub fn choose_seed(&self, query: &str, domain: Domain) -> Option<&PromptSeed> {
        self.seeds
            .iter()
            .map(|seed| (seed, seed.score(query, domain)))
            .fold(None, |best: Option<(&PromptSeed, f64)>, (seed, score)| match best {
                Some((_, best_score)) if best_score >= score => best,
                _ => Some((seed, score)),
            })
            .map(|(seed, _)| seed)
    }

    /// System preamble for a query: optional seed, mode template, and the
    /// `Domain:` / `Mode:` marker lines with the domain guidance.
    pub fn preamble(&self, query: &str, mode: Mode, domain: Domain) -> String {
        let active = self.active();
        let seed_text = self
            .choose_seed(query, domain)
            .map(|seed| {
                debug!(seed = %seed.id, "prompt seed selected");
                format!("{}\n", seed.system)
            })
            .unwrap_or_default();
        format!(
            "{seed_text}{}\n\nDomain: {domain}\nMode: {mode}\n{}",
            active.templates.for_mode(mode),
            domain_enhancement(domain)
        )
    }

    /// Full prompt: preamble, optional context, then the query.
    pub fn build_prompt(
        &self,
        query: &str,
        mode: Mode,
        domain: Domain,
        context: Option<&str>,
    ) -> String {
        let context = context
            .filter(|c| !c.is_empty())
            .map(|c| format!("Context: {c}\n\n"))
            .unwrap_or_default();
        format!(
            "{}\n\n{context}Query: {query}",
            self.preamble(query, mode, domain)
        )
    }
}
