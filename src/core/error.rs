//! Error types for the query pipeline
//!
//! Every module owns its error enum; they converge here into
//! [`PipelineError`], the single error surfaced by `submit_query`.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::audit::AuditError;
use crate::batching::BatchError;
use crate::cache::CacheError;
use crate::core::config::ConfigError;
use crate::embeddings::EmbeddingError;
use crate::inference::InferenceError;
use crate::privacy::PrivacyError;
use crate::screening::ScreeningError;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Pipeline stage with an independent timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Screening,
    CacheLookup,
    BatchWait,
    Inference,
    Privacy,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Screening => "screening",
            Stage::CacheLookup => "cache_lookup",
            Stage::BatchWait => "batch_wait",
            Stage::Inference => "inference",
            Stage::Privacy => "privacy",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Query blocked by threat screening (severity {severity:.2}): {reason}")]
    SecurityBlocked {
        query_id: Uuid,
        severity: f32,
        reason: String,
    },

    #[error("Privacy budget exhausted: requested ε={requested:.4}, remaining ε={remaining:.4}")]
    PrivacyBudgetExhausted { requested: f64, remaining: f64 },

    #[error("No model available: {reason}")]
    ModelUnavailable { reason: String },

    #[error("Batch wait exceeded after {waited_ms}ms")]
    BatchTimeout { waited_ms: u64 },

    #[error("Stage {stage} timed out after {timeout_ms}ms")]
    Timeout { stage: Stage, timeout_ms: u64 },

    #[error("Invalid query: {reason}")]
    InvalidQuery { reason: String },

    #[error("Inference error: {0}")]
    Inference(InferenceError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Screening error: {0}")]
    Screening(#[from] ScreeningError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Privacy error: {0}")]
    Privacy(PrivacyError),

    #[error("Audit error: {0}")]
    Audit(#[from] AuditError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Stable machine-readable code used in audit records
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::SecurityBlocked { .. } => "security_blocked",
            PipelineError::PrivacyBudgetExhausted { .. } => "privacy_budget_exhausted",
            PipelineError::ModelUnavailable { .. } => "model_unavailable",
            PipelineError::BatchTimeout { .. } => "batch_timeout",
            PipelineError::Timeout { .. } => "timeout",
            PipelineError::InvalidQuery { .. } => "invalid_query",
            PipelineError::Inference(_) => "inference",
            PipelineError::Config(_) => "config",
            PipelineError::Screening(_) => "screening",
            PipelineError::Embedding(_) => "embedding",
            PipelineError::Cache(_) => "cache",
            PipelineError::Privacy(_) => "privacy",
            PipelineError::Audit(_) => "audit",
            PipelineError::Internal(_) => "internal",
        }
    }

    /// Whether resubmitting the same query may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::BatchTimeout { .. } | PipelineError::Timeout { .. } => true,
            PipelineError::Inference(e) => e.is_retryable(),
            PipelineError::ModelUnavailable { .. } => true,
            _ => false,
        }
    }

    /// Suggested delay before resubmitting
    pub fn retry_delay_ms(&self) -> Option<u64> {
        match self {
            PipelineError::BatchTimeout { .. } => Some(100),
            PipelineError::Timeout { .. } => Some(500),
            PipelineError::ModelUnavailable { .. } => Some(5_000),
            PipelineError::Inference(e) if e.is_retryable() => Some(1_000),
            _ => None,
        }
    }
}

impl From<InferenceError> for PipelineError {
    fn from(err: InferenceError) -> Self {
        match err {
            InferenceError::ModelUnavailable { reason } => PipelineError::ModelUnavailable { reason },
            InferenceError::Timeout { timeout_ms } => PipelineError::Timeout {
                stage: Stage::Inference,
                timeout_ms,
            },
            other => PipelineError::Inference(other),
        }
    }
}

impl From<PrivacyError> for PipelineError {
    fn from(err: PrivacyError) -> Self {
        match err {
            PrivacyError::BudgetExhausted {
                requested,
                remaining,
            } => PipelineError::PrivacyBudgetExhausted {
                requested,
                remaining,
            },
            other => PipelineError::Privacy(other),
        }
    }
}

impl From<BatchError> for PipelineError {
    fn from(err: BatchError) -> Self {
        match err {
            BatchError::WaitTimeout { waited_ms } => PipelineError::BatchTimeout { waited_ms },
            BatchError::InferenceTimeout { timeout_ms } => PipelineError::Timeout {
                stage: Stage::Inference,
                timeout_ms,
            },
            BatchError::Inference(e) => e.into(),
            BatchError::Dropped => {
                PipelineError::Internal("batch dispatcher dropped the result channel".to_string())
            }
        }
    }
}
