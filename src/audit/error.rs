//! Error types for audit delivery

use thiserror::Error;

/// Result type for audit operations
pub type AuditResult<T> = Result<T, AuditError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuditError {
    /// The sink rejected or could not store a record
    #[error("Audit delivery failed: {reason}")]
    DeliveryFailed { reason: String },
    
    /// The delivery worker has stopped
    #[error("Audit channel closed")]
    ChannelClosed,
    
    /// The queue did not drain in time
    #[error("Audit queue not drained after {timeout_ms}ms ({pending} records pending)")]
    DrainTimeout { timeout_ms: u64, pending: u64 },
}
