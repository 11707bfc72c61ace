//! Error types for batch scheduling

use thiserror::Error;

use crate::inference::InferenceError;

/// Result type for batch operations
pub type BatchResult<T> = Result<T, BatchError>;

/// Errors observed by a waiting query
#[derive(Error, Debug)]
pub enum BatchError {
    /// The job was not dispatched within the wait bound
    #[error("Batch not dispatched within {waited_ms}ms")]
    WaitTimeout { waited_ms: u64 },
    
    /// Dispatched, but no result within the inference timeout
    #[error("Batch inference exceeded {timeout_ms}ms")]
    InferenceTimeout { timeout_ms: u64 },
    
    /// The dispatcher went away without answering
    #[error("Batch result channel dropped")]
    Dropped,
    
    /// Per-item inference failure
    #[error("Inference failed: {0}")]
    Inference(#[from] InferenceError),
}

impl BatchError {
    pub fn is_retryable(&self) -> bool {
        match self {
            BatchError::WaitTimeout { .. } | BatchError::InferenceTimeout { .. } => true,
            BatchError::Dropped => true,
            BatchError::Inference(e) => e.is_retryable(),
        }
    }
}

/// Regression failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegressionError {
    #[error("No training samples")]
    Empty,
    
    #[error("Feature/target length mismatch: {features} rows, {targets} targets")]
    ShapeMismatch { features: usize, targets: usize },
    
    #[error("Singular system")]
    Singular,
}
