//! Confidence gate for human review

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::config::GovernanceConfig;
use crate::quality::QualityReport;

/// Review annotation on a response. A pending review does not withhold the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReviewStatus {
    Approved,
    PendingReview {
        request_id: Uuid,
        confidence: f32,
        threshold: f32,
        expires_at: DateTime<Utc>,
    },
}

impl ReviewStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, ReviewStatus::PendingReview { .. })
    }
}

/// Applies the configured confidence threshold
#[derive(Debug, Clone)]
pub struct ConfidenceGate {
    config: GovernanceConfig,
}

impl ConfidenceGate {
    pub fn new(config: GovernanceConfig) -> Self {
        Self { config }
    }

    pub fn threshold(&self) -> f32 {
        self.config.confidence_threshold
    }

    pub fn evaluate(&self, report: &QualityReport) -> ReviewStatus {
        if report.confidence >= self.config.confidence_threshold {
            return ReviewStatus::Approved;
        }

        let request_id = Uuid::now_v7();
        info!(
            request_id = %request_id,
            confidence = report.confidence,
            threshold = self.config.confidence_threshold,
            "Result flagged for human review"
        );
        ReviewStatus::PendingReview {
            request_id,
            confidence: report.confidence,
            threshold: self.config.confidence_threshold,
            expires_at: Utc::now() + Duration::hours(self.config.review_timeout_hours),
        }
    }
}
