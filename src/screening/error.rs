//! Error types for threat screening

use thiserror::Error;

/// Result type for screening operations
pub type ScreeningResult<T> = Result<T, ScreeningError>;

/// Errors raised while building the screener
#[derive(Error, Debug)]
pub enum ScreeningError {
    #[error("Invalid signature pattern '{name}': {reason}")]
    InvalidPattern { name: String, reason: String },

    #[error("Invalid severity for '{name}': {severity}")]
    InvalidSeverity { name: String, severity: f32 },
}
