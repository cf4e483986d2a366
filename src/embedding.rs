//! Hashed bag-of-words embedding.
//!
//! Defines the [`Embedder`] trait and the default [`HashedBagOfWords`]
//! implementation: tokens are hashed into a fixed number of lanes and the
//! resulting count vector is L2-normalized. Collisions are an accepted
//! approximation — this is deliberately not a learned embedding model.
//!
//! Also provides [`cosine_similarity`], the relevance score used by the
//! vector index.

/// Trait for text embedders.
///
/// The store and index hold their embedder behind this trait so tests and
/// future callers can inject a different vectorization.
pub trait Embedder: Send + Sync {
    /// Embedding vector dimensionality.
    fn dims(&self) -> usize;

    /// Embed `text` into a fixed-length vector.
    ///
    /// Must be a pure function: identical text yields bit-identical vectors.
    fn embed(&self, text: &str) -> Vec<f32>;
}

/// Feature-hashing bag-of-words embedder.
#[derive(Debug, Clone)]
pub struct HashedBagOfWords {
    dims: usize,
}

impl HashedBagOfWords {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

impl Embedder for HashedBagOfWords {
    fn dims(&self) -> usize {
        self.dims
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dims];

        let normalized: String = text
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
            .collect();

        for token in normalized.split_whitespace() {
            let lane = token_hash(token) as usize % self.dims;
            vector[lane] += 1.0;
        }

        let magnitude = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for v in &mut vector {
                *v /= magnitude;
            }
        }

        vector
    }
}

/// 32-bit string hash over UTF-16 code units (`h = h*31 + unit`, wrapping),
/// absolute value. Stable across runs and platforms.
fn token_hash(token: &str) -> u32 {
    let mut hash: i32 = 0;
    for unit in token.encode_utf16() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(unit as i32);
    }
    hash.unsigned_abs()
}

/// Cosine similarity of two vectors.
///
/// Returns 0.0 when the dimensions differ or either vector has zero
/// magnitude (defensive default, not an error).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedder() -> HashedBagOfWords {
        HashedBagOfWords::new(100)
    }

    #[test]
    fn test_embed_is_deterministic() {
        let e = embedder();
        let a = e.embed("The quick brown fox jumps over the lazy dog");
        let b = e.embed("The quick brown fox jumps over the lazy dog");
        assert_eq!(a, b);
    }

    #[test]
    fn test_embed_has_unit_norm() {
        let e = embedder();
        let v = e.embed("hello world");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_embed_empty_is_zero_vector() {
        let e = embedder();
        let v = e.embed("");
        assert_eq!(v.len(), 100);
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_embed_punctuation_only_is_zero_vector() {
        let e = embedder();
        let v = e.embed("?!... ---");
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_embed_ignores_case_and_punctuation() {
        let e = embedder();
        assert_eq!(e.embed("Hello, World!"), e.embed("hello world"));
    }

    #[test]
    fn test_self_similarity_is_one() {
        let e = embedder();
        let v = e.embed("retrieval augmented generation");
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_similarity_is_symmetric() {
        let e = embedder();
        let a = e.embed("kubernetes deployment runbook");
        let b = e.embed("deployment notes for the cluster");
        assert!((cosine_similarity(&a, &b) - cosine_similarity(&b, &a)).abs() < 1e-6);
    }

    #[test]
    fn test_similarity_zero_for_mismatched_dims() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_similarity_zero_for_zero_magnitude() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_overlapping_text_scores_higher() {
        let e = embedder();
        let q = e.embed("rust programming language");
        let close = e.embed("rust is a programming language");
        let far = e.embed("chocolate cake recipe with frosting");
        assert!(cosine_similarity(&q, &close) > cosine_similarity(&q, &far));
    }

    #[test]
    fn test_token_hash_stable() {
        // Pinned values guard against accidental hash changes, which would
        // silently invalidate any persisted expectations.
        assert_eq!(token_hash("a"), 97);
        assert_eq!(token_hash(""), 0);
        assert_eq!(token_hash("hello"), token_hash("hello"));
        assert_ne!(token_hash("hello"), token_hash("world"));
    }
}
