//! Exact vector index over embedded passages.
//!
//! This module provides the nearest-neighbor structure at the heart of the
//! retrieval subsystem: a bulk-built, immutable index answering k-NN queries
//! by squared Euclidean distance with a deterministic ranking order.
//!
//! # Architecture
//! The concrete strategy is a brute-force flat scan (`FlatIndex`), chosen
//! because corpora stay small and exactness beats recall tuning at that
//! scale. The `build`/`search` surface is strategy-agnostic so a partitioned
//! or approximate index could be swapped in without touching callers.

mod flat;
mod types;

// Re-export core types for public API
pub use flat::FlatIndex;
pub use types::{Dimension, Position, SearchHit};
