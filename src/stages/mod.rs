//! # Stage: Solve / Verify / Repair Loop
//!
//! ## Responsibility
//! The per-query reasoning stages that sit between classification and the
//! memory write: skeleton planning, stepwise solving, verification with
//! domain validators, a single bounded repair pass, unification, and
//! finalisation. Also hosts the quick-respond short circuit.
//!
//! ## Guarantees
//! - Never fatal: every provider failure becomes a retry, a fallback value or
//!   "no findings"; every stage returns a value
//! - Ordered: steps are solved strictly in skeleton order and prior steps are
//!   never rewritten by the solver
//! - Bounded: at most 3 attempts per step and at most 1 repair pass per run
//!
//! ## NOT Responsible For
//! - Choosing the path (that belongs to `pipeline`)
//! - Persisting traces (that belongs to `memory`)

pub mod finalize;
pub mod quick;
pub mod repair;
pub mod skeleton;
pub mod solver;
pub mod unify;
pub mod validators;
pub mod verifier;

use crate::provider::{invoke_with_timeout, Provider, ProviderError};
use std::time::Duration;

pub use finalize::{finalize, FinalizedReasoning, CONFIDENCE_CEILING, CONFIDENCE_FLOOR};
pub use quick::{quick_respond, QuickResponse};
pub use repair::{
    collect_repair_instructions, normalize_step_count, repair_reasoning, RepairInstruction,
    RepairOutcome,
};
pub use skeleton::{generate_skeleton, parse_skeleton, ReasoningSkeleton, SkeletonParseError};
pub use solver::{solve_skeleton, SolvedStep, SolverOutput, STEP_ATTEMPTS};
pub use unify::{unify, UnifiedReasoning};
pub use validators::{verify_logic, verify_math, LogicVerification, MathVerification};
pub use verifier::{parse_critic, verify_solution, CriticVerdict, VerificationResult};

/// Marker strings embedded in stage prompts.
///
/// Providers are free to ignore them; the deterministic provider uses them
/// to tell prompt kinds apart.
pub mod markers {
    /// Opens every skeleton planning prompt.
    pub const PLAN: &str = "You are an expert reasoning planner.";
    /// Opens every critic prompt.
    pub const CRITIC: &str = "You are a strict verifier.";
    /// Opens every repair prompt.
    pub const REPAIR: &str = "The following reasoning has issues.";
    /// Prefix of the step-execution line, followed by `N of M`.
    pub const STEP: &str = "You are executing step ";
    /// Instruction line of the quick-respond prompt.
    pub const QUICK: &str = "Answer the following question in one or two sentences";
    /// Section header preceding the reasoning in a repair prompt.
    pub const REPAIR_ORIGINAL: &str = "Original reasoning:\n";
    /// Section header following the reasoning in a repair prompt.
    pub const REPAIR_ISSUES: &str = "\n\nIssues to fix:";
}

/// Step text used when the provider never produced content for an instruction.
pub fn fallback_step_content(instruction: &str) -> String {
    format!("Unable to complete instruction \"{instruction}\"; fallback explanation provided.")
}

/// One provider, one model and one timeout: everything a stage needs to
/// issue a call.
#[derive(Clone, Copy)]
pub struct ProviderCall<'a> {
    /// Backend to call.
    pub provider: &'a dyn Provider,
    /// Model name passed through to the provider.
    pub model: &'a str,
    /// Per-call deadline.
    pub timeout: Duration,
}

impl<'a> ProviderCall<'a> {
    /// Bundle a call target.
    pub fn new(provider: &'a dyn Provider, model: &'a str, timeout: Duration) -> Self {
        Self {
            provider,
            model,
            timeout,
        }
    }

    /// Same provider and model with the timeout capped at `cap`.
    pub fn capped(self, cap: Duration) -> Self {
        Self {
            timeout: self.timeout.min(cap),
            ..self
        }
    }

    /// Send `prompt`, bounded by the timeout.
    ///
    /// # Errors
    ///
    /// Whatever [`invoke_with_timeout`] returns.
    pub async fn invoke(&self, prompt: &str) -> Result<String, ProviderError> {
        invoke_with_timeout(self.provider, prompt, self.model, self.timeout).await
    }
}
