//! Embedding generation for passages and queries.
//!
//! The retrieval core treats embedding as an opaque capability behind the
//! `TextEmbedder` trait: text in, fixed-dimension vector out. The production
//! implementation (`OpenAiEmbedder`) calls an OpenAI-compatible HTTP endpoint;
//! tests substitute a deterministic in-process embedder.

mod remote;

pub use remote::OpenAiEmbedder;

use async_trait::async_trait;

use crate::error::RetrievalResult;
use crate::index::Dimension;

/// Trait for turning text into fixed-dimension embedding vectors.
///
/// Implementations must be thread-safe; the retrieval service shares one
/// embedder across concurrent rebuilds and queries. Calls may suspend (the
/// production embedder is network-bound), so both operations are async.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    /// Embed a single text.
    ///
    /// Fails with `EmbeddingFailure` when the capability is unreachable,
    /// rate-limited past the retry budget, or returns a malformed result.
    async fn embed(&self, text: &str) -> RetrievalResult<Vec<f32>>;

    /// Embed a batch of texts, preserving input order.
    ///
    /// Fails the whole batch if any element fails: a half-embedded corpus
    /// must never reach the index builder.
    async fn embed_batch(&self, texts: &[String]) -> RetrievalResult<Vec<Vec<f32>>>;

    /// Dimension of every vector this embedder produces.
    fn dimension(&self) -> Dimension;
}

/// Deterministic in-process embedder for testing.
///
/// Embeds text as a hashed bag of words: each lowercased word bumps one
/// bucket of the vector, which is then normalized to unit length. Texts
/// sharing words land close together under squared Euclidean distance, which
/// is enough signal for ranking assertions without a model download.
#[cfg(test)]
pub struct MockTextEmbedder {
    dimension: Dimension,
}

#[cfg(test)]
impl Default for MockTextEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl MockTextEmbedder {
    /// Standard small test dimension; big enough to keep hash collisions
    /// from dominating, small enough to eyeball in failures.
    pub fn new() -> Self {
        Self {
            dimension: Dimension::new(16).expect("nonzero"),
        }
    }

    pub fn with_dimension(dimension: Dimension) -> Self {
        Self { dimension }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        use std::hash::{DefaultHasher, Hash, Hasher};

        let dim = self.dimension.get();
        let mut vector = vec![0.0f32; dim];

        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            vector[(hasher.finish() as usize) % dim] += 1.0;
        }

        let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }
        vector
    }
}

#[cfg(test)]
#[async_trait]
impl TextEmbedder for MockTextEmbedder {
    async fn embed(&self, text: &str) -> RetrievalResult<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> RetrievalResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn dimension(&self) -> Dimension {
        self.dimension
    }
}
