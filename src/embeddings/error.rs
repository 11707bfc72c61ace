//! Error types for the feature embedder

use thiserror::Error;

/// Result type for embedding operations
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

/// Errors that can occur during embedding
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Text contains no characters to featurize
    #[error("Cannot embed empty text")]
    EmptyInput,
    
    /// Vector dimensions disagree
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    
    /// Invalid embedder configuration
    #[error("Invalid embedding configuration: {reason}")]
    InvalidConfig { reason: String },
}
