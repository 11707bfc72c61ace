//! Feature embeddings for semantic cache keys
//!
//! This module provides:
//! - Deterministic hashed-feature text embeddings
//! - Cosine similarity and normalization helpers

mod config;
mod error;
mod feature_embedder;


pub use config::EmbeddingConfig;
pub use error::{EmbeddingError, EmbeddingResult};
pub use feature_embedder::{cosine_similarity, normalize, FeatureEmbedder};
