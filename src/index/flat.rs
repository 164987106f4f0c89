//! Exact nearest-neighbor index over a fixed set of embedding vectors.
//!
//! The index is a brute-force linear scan using squared Euclidean distance.
//! That is a deliberate choice: corpora here are small (one document's worth
//! of passages), and an exact scan is both fast enough and fully
//! deterministic. A sub-linear structure can replace this behind the same
//! `build`/`search` contract if corpora grow past a few thousand passages.

use tracing::debug;

use crate::error::{RetrievalError, RetrievalResult};
use crate::index::{Dimension, Position, SearchHit};

/// Immutable exact k-NN index.
///
/// Vectors are stored row-major in a single flat buffer, exactly as given at
/// build time (no normalization, no preprocessing). Once built the index
/// never changes; replacing the corpus means building a new index.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimension: Dimension,
    /// Row-major vector data, `len * dimension` values.
    data: Vec<f32>,
    len: usize,
}

impl FlatIndex {
    /// Builds an index from an ordered sequence of vectors.
    ///
    /// Vector `i` becomes `Position(i)`. Build is O(n * dim): one dimension
    /// check and one copy per vector.
    ///
    /// # Errors
    /// - `EmptyCorpus` if `vectors` is empty
    /// - `DimensionMismatch` if any vector's length differs from `dimension`
    pub fn build(dimension: Dimension, vectors: &[Vec<f32>]) -> RetrievalResult<Self> {
        if vectors.is_empty() {
            return Err(RetrievalError::EmptyCorpus);
        }

        let dim = dimension.get();
        let mut data = Vec::with_capacity(vectors.len() * dim);
        for vector in vectors {
            dimension.validate(vector)?;
            data.extend_from_slice(vector);
        }

        debug!(vectors = vectors.len(), dim, "built flat index");
        Ok(Self {
            dimension,
            data,
            len: vectors.len(),
        })
    }

    /// Returns the k nearest neighbors of `query` by squared Euclidean
    /// distance, at most `min(k, self.len())` hits.
    ///
    /// Results are ordered by ascending distance; equal distances rank the
    /// lower position first, so repeated calls with identical inputs return
    /// identical sequences. Search is O(n * dim).
    ///
    /// # Errors
    /// - `DimensionMismatch` if `query.len()` differs from the index dimension
    pub fn search(&self, query: &[f32], k: usize) -> RetrievalResult<Vec<SearchHit>> {
        self.dimension.validate(query)?;

        if k == 0 {
            return Ok(Vec::new());
        }

        let dim = self.dimension.get();
        let mut hits: Vec<SearchHit> = self
            .data
            .chunks_exact(dim)
            .enumerate()
            .map(|(i, row)| SearchHit {
                position: Position::new(i as u32),
                distance: squared_euclidean(query, row),
            })
            .collect();

        hits.sort_unstable_by(SearchHit::rank_order);
        hits.truncate(k);
        Ok(hits)
    }

    /// Number of indexed vectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Dimension shared by every vector in this index.
    #[must_use]
    pub fn dimension(&self) -> Dimension {
        self.dimension
    }
}

/// Sum of squared per-dimension differences. No square root: ranking by
/// squared distance is identical to ranking by distance and skips the sqrt.
fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
