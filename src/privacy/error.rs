//! Error types for the privacy guard

use thiserror::Error;

/// Result type for privacy operations
pub type PrivacyResult<T> = Result<T, PrivacyError>;

/// Errors raised by the privacy guard
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PrivacyError {
    /// Not enough ε left in the current epoch
    #[error("Privacy budget exhausted: requested ε={requested:.4}, remaining ε={remaining:.4}")]
    BudgetExhausted { requested: f64, remaining: f64 },
    
    /// ε, δ, sensitivity or value out of range
    #[error("Invalid privacy parameter: {reason}")]
    InvalidParameter { reason: String },
    
    /// A redaction pattern failed to compile
    #[error("Invalid redaction pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
    
    /// A sealed value failed its integrity check
    #[error("Sealed value is corrupted")]
    SealedValueCorrupted,
}

impl PrivacyError {
    /// Budget exhaustion only clears after an operator refresh
    pub fn is_retryable(&self) -> bool {
        false
    }
}
