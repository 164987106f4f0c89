//! Error types for the retrieval subsystem
//!
//! This module provides structured error types using thiserror for better
//! error handling and actionable error messages.

use crate::index::Position;
use thiserror::Error;

/// Main error type for retrieval operations
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// The remote embedding capability failed after retries were exhausted
    #[error("Embedding request failed: {reason}\nSuggestion: Check network connectivity and the configured endpoint, then retry")]
    EmbeddingFailure { reason: String },

    /// Rebuild was called with zero passages
    #[error("Cannot build an index from an empty corpus\nSuggestion: Ingest at least one passage before rebuilding")]
    EmptyCorpus,

    /// Vectors of inconsistent length reached the index or a query
    #[error("Vector dimension mismatch: expected {expected}, got {actual}\nSuggestion: Ensure all vectors come from the same embedding model configuration")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A search hit referenced a position outside its generation's registry
    #[error("Position {position} is out of range for a registry of {len} passages")]
    PositionOutOfRange { position: Position, len: usize },

    /// A rebuild is already in flight
    #[error("A rebuild is already in progress\nSuggestion: Back off and retry once the current rebuild completes")]
    BuildInProgress,

    /// No generation has been built yet
    #[error("No index generation is ready to serve queries\nSuggestion: Trigger a rebuild first")]
    IndexNotReady,

    /// Configuration errors
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },
}

impl RetrievalError {
    /// Get a stable status code for this error type.
    ///
    /// Returns a string identifier that can be used in JSON responses
    /// for programmatic error handling.
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::EmbeddingFailure { .. } => "EMBEDDING_FAILURE",
            Self::EmptyCorpus => "EMPTY_CORPUS",
            Self::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            Self::PositionOutOfRange { .. } => "POSITION_OUT_OF_RANGE",
            Self::BuildInProgress => "BUILD_IN_PROGRESS",
            Self::IndexNotReady => "INDEX_NOT_READY",
            Self::Config { .. } => "CONFIG_ERROR",
        }
    }

    /// Whether the condition is expected to clear on its own, making a
    /// caller-side retry reasonable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BuildInProgress | Self::EmbeddingFailure { .. })
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::EmbeddingFailure { .. } => vec![
                "Verify the embedding endpoint is reachable and the API key is valid",
                "Transient failures are retried automatically; persistent ones need operator attention",
            ],
            Self::DimensionMismatch { .. } => vec![
                "Check that embedding.model and embedding.dimension agree in the settings",
                "Rebuild the index after correcting the model configuration",
            ],
            Self::BuildInProgress => vec![
                "Only one rebuild runs at a time; wait for it to finish and retry",
            ],
            Self::IndexNotReady => vec![
                "Call rebuild with the ingested corpus before issuing queries",
            ],
            Self::PositionOutOfRange { .. } => vec![
                "This indicates an orchestration bug; positions are only valid within the generation that produced them",
            ],
            _ => vec![],
        }
    }
}

/// Result type alias for retrieval operations
pub type RetrievalResult<T> = Result<T, RetrievalError>;
