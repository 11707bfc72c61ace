//! Threat screening
//!
//! First stage of the pipeline:
//! - Ordered signature matching (structured-query, script, instruction
//!   override, credential probes)
//! - Rolling z-score anomaly detection on query shape
//! - Allow / Monitor / Block decision with configurable thresholds
//! - Security summary statistics

mod baseline;
mod config;
mod error;
mod screener;
mod signatures;
mod types;

#[cfg(test)]
mod tests;

pub use baseline::{QueryShape, RollingBaseline};
pub use config::{CustomSignature, ScreeningConfig};
pub use error::{ScreeningError, ScreeningResult};
pub use screener::ThreatScreener;
pub use signatures::{SignatureSet, ThreatSignature};
pub use types::{
    PatternMatch, SecuritySummary, ThreatAssessment, ThreatCategory, ThreatDecision,
};
