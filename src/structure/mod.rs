//! # Stage: Structure Detection & Decomposition
//!
//! ## Responsibility
//! Recognise the shape of a problem (Diophantine equation, inequality,
//! paradox, moral dilemma, ...) from its text, expand the shape into a step
//! template with constraints and invariants, and frame it in exactly one
//! formal schema.
//!
//! ## Guarantees
//! - Deterministic: pure regex-table lookups, no I/O
//! - Total: unmatched text falls back to the general shape with confidence 0.3
//! - Single schema: the priority table always selects exactly one schema
//!
//! ## NOT Responsible For
//! - Proving anything (all detection is heuristic)
//! - Planning the provider-facing skeleton (that belongs to `stages::skeleton`)

pub mod decompose;
pub mod detector;
pub mod formal;

pub use decompose::{decompose, Decomposition, StepEdge};
pub use detector::{detect_structure, ProblemStructure, StructureKind};
pub use formal::{formal_skeleton, select_schema, FormalSchema, FormalSkeleton};
