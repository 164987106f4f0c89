//! Type-safe wrappers for the vector index.
//!
//! Newtypes here prevent primitive obsession at the index boundary: a
//! `Position` is only meaningful within the generation that assigned it, and
//! a `Dimension` is validated once instead of re-checked ad hoc.

use serde::{Deserialize, Serialize};

use crate::error::{RetrievalError, RetrievalResult};

/// Ordinal position of a passage within one index generation.
///
/// Positions are assigned by insertion order at build time, starting at zero,
/// and are never reused once a generation is discarded. A plain `u32` is used
/// rather than `NonZeroU32` because position zero is a valid first passage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position(u32);

impl Position {
    /// Creates a new `Position`.
    #[must_use]
    pub const fn new(ordinal: u32) -> Self {
        Self(ordinal)
    }

    /// Returns the underlying ordinal value.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Returns the ordinal as a usize for slice indexing.
    #[must_use]
    pub const fn as_index(&self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Type-safe wrapper for embedding dimensions.
///
/// Every vector in a generation must share one dimension; validating through
/// this type turns a silent length drift into a `DimensionMismatch` error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension(usize);

impl Dimension {
    /// Creates a new `Dimension` with validation.
    ///
    /// Returns an error if the dimension is zero.
    pub fn new(dim: usize) -> RetrievalResult<Self> {
        if dim == 0 {
            return Err(RetrievalError::Config {
                reason: "embedding dimension cannot be zero".to_string(),
            });
        }
        Ok(Self(dim))
    }

    /// Returns the underlying dimension value.
    #[must_use]
    pub const fn get(&self) -> usize {
        self.0
    }

    /// Validates that a vector has this dimension.
    pub fn validate(&self, vector: &[f32]) -> RetrievalResult<()> {
        if vector.len() != self.0 {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.0,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One k-NN search result: a passage position and its squared Euclidean
/// distance to the query vector. Smaller distance means more similar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub position: Position,
    pub distance: f32,
}

impl SearchHit {
    /// Total ordering used for ranking: ascending distance, ties broken by
    /// ascending position so identical inputs always rank identically.
    #[must_use]
    pub fn rank_order(&self, other: &Self) -> std::cmp::Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.position.cmp(&other.position))
    }
}
