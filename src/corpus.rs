//! Passage registry pairing index positions with their source text.
//!
//! A registry is built once per index generation and maps each `Position`
//! back to the passage that produced the vector at that position. It has no
//! mutation API: passages are immutable once registered, and replacing the
//! corpus means building a new registry alongside a new index.

use crate::error::{RetrievalError, RetrievalResult};
use crate::index::Position;

/// A unit of source text eligible for retrieval, identified solely by its
/// ordinal position within the generation that registered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Passage {
    pub position: Position,
    pub text: String,
}

/// Ordinal mapping from index position to source passage.
#[derive(Debug, Clone)]
pub struct CorpusRegistry {
    passages: Vec<Passage>,
}

impl CorpusRegistry {
    /// Registers passages in order, assigning positions `0..n-1`.
    #[must_use]
    pub fn from_texts<I>(texts: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let passages = texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| Passage {
                position: Position::new(i as u32),
                text,
            })
            .collect();
        Self { passages }
    }

    /// Resolves a position back to its passage.
    ///
    /// # Errors
    /// Returns `PositionOutOfRange` if the position was not assigned by this
    /// registry. Positions from another generation are not valid here.
    pub fn resolve(&self, position: Position) -> RetrievalResult<&Passage> {
        self.passages
            .get(position.as_index())
            .ok_or(RetrievalError::PositionOutOfRange {
                position,
                len: self.passages.len(),
            })
    }

    /// Number of registered passages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.passages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Iterates passages in position order.
    pub fn iter(&self) -> impl Iterator<Item = &Passage> {
        self.passages.iter()
    }
}
