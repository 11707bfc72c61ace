//! moat-core - query optimization and protection for MoatMetrics analytics
//!
//! This crate sits between callers asking analytics questions and the
//! models that answer them:
//! - Threat screening against injection, jailbreak and extraction attempts
//! - Semantic caching of protected answers
//! - Hardware-aware model selection with residency leases
//! - Adaptive batching sized by a ridge-regression load model
//! - Differential privacy with a tracked ε budget
//! - Quality and uncertainty scoring with a governance gate
//! - Ordered, at-least-once audit delivery

pub mod core;
pub mod embeddings;
pub mod screening;
pub mod cache;
pub mod selector;
pub mod batching;
pub mod inference;
pub mod privacy;
pub mod quality;
pub mod audit;
pub mod logging;
pub mod pipeline;

// Re-export commonly used items
pub use crate::core::error::{PipelineError, Result, Stage};
pub use crate::core::config::PipelineConfig;
pub use crate::core::types::{AnalyticsPayload, ComputationPath, Query};
pub use crate::inference::{InferenceBackend, RawResult, TabularSource};
pub use crate::audit::{AuditSink, ReviewStatus};
pub use crate::pipeline::{PipelineBuilder, PipelineResponse, QueryPipeline, ThreatAnnotation};
