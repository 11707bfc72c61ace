//! Audit trail and governance gate
//!
//! - Typed audit records for threat, privacy, quality and error events
//! - Single ordered delivery worker with per-query sequence numbers
//! - Retry with capped backoff (at-least-once)
//! - Confidence threshold gate producing review annotations

mod config;
mod error;
mod events;
mod governance;
mod sink;
mod trail;


pub use config::{AuditConfig, GovernanceConfig};
pub use error::{AuditError, AuditResult};
pub use events::{AuditEvent, AuditRecord};
pub use governance::{ConfidenceGate, ReviewStatus};
pub use sink::{AuditSink, MemoryAuditSink, TracingAuditSink};
pub use trail::{AuditStats, AuditTrail};
