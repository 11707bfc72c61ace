//! Audit record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::error::Stage;
use crate::privacy::NoiseMechanism;
use crate::quality::QualityReport;
use crate::screening::ThreatDecision;

/// Something the governance collaborator must see
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    ThreatAssessed {
        decision: ThreatDecision,
        severity: f32,
        signatures: Vec<String>,
        anomaly_z: f64,
    },
    PrivacySpent {
        epsilon: f64,
        mechanism: Option<NoiseMechanism>,
        remaining_epsilon: f64,
        epoch: u64,
    },
    PrivacyRejected {
        requested: f64,
        remaining: f64,
    },
    PrivacyRefreshed {
        epoch: u64,
        total_epsilon: f64,
    },
    QualityReported {
        report: QualityReport,
        cache_hit: bool,
    },
    CacheCorruption {
        entry_id: Uuid,
        reason: String,
    },
    ReviewRequired {
        request_id: Uuid,
        confidence: f32,
        threshold: f32,
        expires_at: DateTime<Utc>,
    },
    Error {
        code: String,
        message: String,
        stage: Option<Stage>,
    },
}

impl AuditEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            AuditEvent::ThreatAssessed { .. } => "threat_assessed",
            AuditEvent::PrivacySpent { .. } => "privacy_spent",
            AuditEvent::PrivacyRejected { .. } => "privacy_rejected",
            AuditEvent::PrivacyRefreshed { .. } => "privacy_refreshed",
            AuditEvent::QualityReported { .. } => "quality_reported",
            AuditEvent::CacheCorruption { .. } => "cache_corruption",
            AuditEvent::ReviewRequired { .. } => "review_required",
            AuditEvent::Error { .. } => "error",
        }
    }
}

/// One delivered audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub record_id: Uuid,
    
    /// `None` for process-wide events such as budget refreshes
    pub query_id: Option<Uuid>,
    
    /// Per-query sequence, starting at 1; process-wide events share their own sequence
    pub sequence: u64,
    
    /// Pseudonymized caller id
    pub caller_digest: Option<String>,
    
    pub timestamp: DateTime<Utc>,
    
    pub event: AuditEvent,
}
