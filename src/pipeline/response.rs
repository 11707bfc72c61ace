//! Pipeline output types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::{AuditStats, ReviewStatus};
use crate::batching::BatchStats;
use crate::cache::CacheStats;
use crate::core::types::AnalyticsPayload;
use crate::logging::PerformanceMetrics;
use crate::privacy::{BudgetSnapshot, SealedValue};
use crate::quality::{QualityReport, Recommendation};
use crate::screening::{SecuritySummary, ThreatAssessment};
use crate::selector::{ModelUsage, ResidencyStatus};

/// Screening outcome attached to an answered query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ThreatAnnotation {
    Clear,
    /// Answered, but flagged and kept out of the shared cache
    Monitored { severity: f32, patterns: Vec<String> },
}

impl ThreatAnnotation {
    pub fn from_assessment(assessment: &ThreatAssessment) -> Self {
        if assessment.is_monitored() {
            ThreatAnnotation::Monitored {
                severity: assessment.severity,
                patterns: assessment.signature_names(),
            }
        } else {
            ThreatAnnotation::Clear
        }
    }

    pub fn is_monitored(&self) -> bool {
        matches!(self, ThreatAnnotation::Monitored { .. })
    }
}

/// Answer to one `submit_query` call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResponse {
    pub query_id: Uuid,

    /// Privacy-protected analytics content
    pub result: AnalyticsPayload,

    pub report: QualityReport,

    pub cache_hit: bool,

    pub threat: ThreatAnnotation,

    /// Governance outcome; pending results are still returned
    pub review: ReviewStatus,

    /// Model that computed the result, `None` for cache hits
    pub model_id: Option<String>,

    /// Similarity of the matched cache entry
    pub similarity: Option<f32>,

    /// Confidence sealed by the secure computation backend
    pub sealed_confidence: Option<SealedValue>,

    pub duration_ms: u64,
}

/// Point-in-time view across every stage
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceReport {
    pub generated_at: DateTime<Utc>,
    pub uptime_secs: u64,
    pub metrics: PerformanceMetrics,
    pub cache: CacheStats,
    pub privacy: BudgetSnapshot,
    pub security: SecuritySummary,
    pub batching: BatchStats,
    pub residency: ResidencyStatus,
    pub models: Vec<ModelUsage>,
    pub audit: AuditStats,
    pub recommendations: Vec<Recommendation>,
}
