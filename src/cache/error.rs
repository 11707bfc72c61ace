//! Error types for the semantic cache

use thiserror::Error;

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur while writing to the cache
#[derive(Error, Debug)]
pub enum CacheError {
    /// Embedding does not match the cache dimension
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    
    /// Entry failed the consistency check
    #[error("Invalid cache entry: {reason}")]
    InvalidEntry { reason: String },
    
    /// Seed query could not be embedded
    #[error("Cache seed failed: {reason}")]
    SeedFailed { reason: String },
}
