//! Quality report types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::types::ComputationPath;

/// Confidence reductions applied to one result
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PenaltyBreakdown {
    /// Empty datasets, inconsistent totals, zero or non-finite metrics
    pub missing_inputs: f32,
    
    /// Metrics far from the rest
    pub outliers: f32,
    
    /// Long, analytical, multi-part or cross-correlation queries
    pub complexity: f32,
}

impl PenaltyBreakdown {
    pub fn total(&self) -> f32 {
        self.missing_inputs + self.outliers + self.complexity
    }
}

/// Scores attached to a served response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub confidence: f32,
    pub quality: f32,
    pub security: f32,
    pub lower_bound: f32,
    pub upper_bound: f32,
    
    /// Weighted ordering value; never gates delivery
    pub composite: f32,
    
    pub penalties: PenaltyBreakdown,
    pub path: ComputationPath,
    pub created_at: DateTime<Utc>,
}

impl QualityReport {
    pub fn interval_width(&self) -> f32 {
        self.upper_bound - self.lower_bound
    }
}
