//! # Stage: Text Fingerprinting
//!
//! ## Responsibility
//! Turn text into a deterministic fixed-length numeric fingerprint and compare
//! fingerprints by cosine similarity. Used by the memory cache lookup, prompt
//! seed selection and the unifier's coherence score.
//!
//! ## Guarantees
//! - Deterministic: the same text always yields the same fingerprint
//! - Bounded: similarity is always in `[-1.0, 1.0]`, and `0.0` for degenerate input
//! - Non-blocking: pure CPU work, no allocation beyond the output vector
//!
//! ## NOT Responsible For
//! - Semantic embeddings (fingerprints are character histograms)
//! - Thresholding (callers decide what counts as "similar")

use std::collections::HashMap;

/// Number of buckets in a character fingerprint.
pub const FINGERPRINT_DIM: usize = 128;

/// Build a 128-bucket character histogram of `text`, L2-normalised.
///
/// Every character of every whitespace-separated token increments the bucket
/// `code_point % 128`. Whitespace itself is never counted. An empty or
/// whitespace-only input yields the all-zero vector.
///
/// # Panics
///
/// This function never panics.
pub fn vectorize(text: &str) -> Vec<f64> {
    let mut acc = vec![0.0f64; FINGERPRINT_DIM];
    for token in text.split_whitespace() {
        for ch in token.chars() {
            acc[(ch as u32 as usize) % FINGERPRINT_DIM] += 1.0;
        }
    }
    let norm: f64 = acc.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm > 1e-9 {
        acc.iter_mut().for_each(|v| *v /= norm);
    }
    acc
}

/// Cosine similarity between two vectors.
///
/// Returns `0.0` when the lengths differ, either input is empty, or either
/// vector has zero magnitude.
///
/// # Panics
///
/// This function never panics.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f64 = a.iter().map(|v| v * v).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|v| v * v).sum::<f64>().sqrt();
    if mag_a < 1e-9 || mag_b < 1e-9 {
        return 0.0;
    }
    (dot / (mag_a * mag_b)).clamp(-1.0, 1.0)
}

/// Fingerprint similarity of two texts.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    cosine_similarity(&vectorize(a), &vectorize(b))
}

/// Cosine similarity over word-frequency vectors of two texts.
///
/// Words are lowercase runs of word characters; both texts are projected onto
/// their shared vocabulary before comparison.
pub fn bag_of_words_cosine(a: &str, b: &str) -> f64 {
    let fa = word_frequencies(a);
    let fb = word_frequencies(b);
    if fa.is_empty() || fb.is_empty() {
        return 0.0;
    }
    let dot: f64 = fa
        .iter()
        .filter_map(|(word, &x)| fb.get(word).map(|&y| x * y))
        .sum();
    let mag_a: f64 = fa.values().map(|v| v * v).sum::<f64>().sqrt();
    let mag_b: f64 = fb.values().map(|v| v * v).sum::<f64>().sqrt();
    (dot / (mag_a * mag_b)).clamp(0.0, 1.0)
}

fn word_frequencies(text: &str) -> HashMap<String, f64> {
    let mut freq = HashMap::new();
    for word in text
        .to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
    {
        *freq.entry(word.to_string()).or_insert(0.0) += 1.0;
    }
    freq
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vectorize_is_deterministic_and_normalised() {
        let a = vectorize("Is Socrates mortal?");
        let b = vectorize("Is Socrates mortal?");
        assert_eq!(a, b);
        let norm: f64 = a.iter().map(|v| v * v).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_vectorize_empty_is_zero_vector() {
        let v = vectorize("   ");
        assert_eq!(v.len(), FINGERPRINT_DIM);
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_vectorize_ignores_whitespace_layout() {
        assert_eq!(vectorize("a  b\tc"), vectorize("a b c"));
    }

    #[test]
    fn test_cosine_similarity_identical_is_one() {
        let v = vectorize("what is the capital of france");
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_similarity_length_mismatch_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_cosine_similarity_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_text_similarity_orders_related_texts_higher() {
        let near = text_similarity("is socrates mortal", "is socrates a mortal");
        let far = text_similarity("is socrates mortal", "12345 67890");
        assert!(near > far);
        assert!(near > 0.9);
    }

    #[test]
    fn test_bag_of_words_shared_vocabulary() {
        assert!((bag_of_words_cosine("the cat sat", "the cat sat") - 1.0).abs() < 1e-9);
        assert_eq!(bag_of_words_cosine("alpha beta", "gamma delta"), 0.0);
        let partial = bag_of_words_cosine("the cat sat", "the dog sat");
        assert!(partial > 0.5 && partial < 1.0);
    }

    #[test]
    fn test_bag_of_words_empty_is_zero() {
        assert_eq!(bag_of_words_cosine("", "words"), 0.0);
        assert_eq!(bag_of_words_cosine("...", "!!!"), 0.0);
    }
}
