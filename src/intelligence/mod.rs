//! Intelligence subsystem: text similarity, quality evaluation and the
//! versioned prompt-template registry the learner mutates.

pub mod quality;
pub mod similarity;
pub mod templates;

pub use quality::{
    adaptive_confidence, evaluate, prompt_mutation_probability, self_consistency, unified_quality,
    Evaluation,
};
pub use similarity::{bag_of_words_cosine, cosine_similarity, text_similarity, vectorize};
pub use templates::{ModeTemplates, PromptSeed, TemplateError, TemplateRegistry, TemplateVersion};
