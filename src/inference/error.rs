//! Error types for the inference module

use thiserror::Error;

/// Inference-specific errors
#[derive(Debug, Error, Clone)]
pub enum InferenceError {
    /// The backend ran but could not compute this item
    #[error("Computation failed: {reason}")]
    ComputationFailed { reason: String },

    /// A specific model failed
    #[error("Model {model_id} failed: {reason}")]
    ModelFailed { model_id: String, reason: String },

    /// No candidate model could serve the request
    #[error("No model available: {reason}")]
    ModelUnavailable { reason: String },

    /// Timeout error
    #[error("Inference timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The request cannot be computed by any model
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// Data source error
    #[error("Data source error: {reason}")]
    DataSource { reason: String },

    /// Internal error
    #[error("Internal error: {reason}")]
    Internal { reason: String },
}

impl InferenceError {
    /// Whether a second attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            InferenceError::ComputationFailed { .. }
                | InferenceError::ModelFailed { .. }
                | InferenceError::Timeout { .. }
                | InferenceError::DataSource { .. }
        )
    }
}

impl From<serde_json::Error> for InferenceError {
    fn from(err: serde_json::Error) -> Self {
        InferenceError::InvalidRequest {
            reason: err.to_string(),
        }
    }
}

/// Result type for inference operations
pub type InferenceResult<T> = std::result::Result<T, InferenceError>;
