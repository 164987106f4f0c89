//! The main library module for semrank
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod index;
pub mod service;

// Explicit exports for better API clarity
pub use config::Settings;
pub use corpus::{CorpusRegistry, Passage};
pub use embedding::{OpenAiEmbedder, TextEmbedder};
pub use error::{RetrievalError, RetrievalResult};
pub use index::{Dimension, FlatIndex, Position, SearchHit};
pub use service::{IndexGeneration, RetrievalService, ScoredPassage};
