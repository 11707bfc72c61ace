//! Threat screening types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Outcome of screening a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatDecision {
    /// Proceed normally
    Allow,
    /// Proceed, but restrict caching and annotate the response
    Monitor,
    /// Reject before any other stage runs
    Block,
}

impl ThreatDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatDecision::Allow => "allow",
            ThreatDecision::Monitor => "monitor",
            ThreatDecision::Block => "block",
        }
    }
}

impl fmt::Display for ThreatDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Family of a matched signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatCategory {
    SqlInjection,
    ScriptInjection,
    PromptInjection,
    DataExfiltration,
    Anomaly,
}

impl ThreatCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatCategory::SqlInjection => "sql_injection",
            ThreatCategory::ScriptInjection => "script_injection",
            ThreatCategory::PromptInjection => "prompt_injection",
            ThreatCategory::DataExfiltration => "data_exfiltration",
            ThreatCategory::Anomaly => "anomaly",
        }
    }
}

impl fmt::Display for ThreatCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single signature hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternMatch {
    /// Signature name
    pub signature: String,

    pub category: ThreatCategory,

    /// Severity assigned by the signature
    pub severity: f32,

    /// Matched fragment (truncated)
    pub fragment: String,
}

/// Screening verdict for one query. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatAssessment {
    pub query_id: Uuid,

    /// Signature hits in evaluation order
    pub matches: Vec<PatternMatch>,

    /// Largest z-score of the statistical features (0 while the baseline warms up)
    pub anomaly_z: f64,

    /// Severity contributed by the anomaly detector
    pub anomaly_severity: f32,

    /// Overall severity in [0, 1]
    pub severity: f32,

    pub decision: ThreatDecision,

    /// Human-readable reasons
    pub risk_factors: Vec<String>,

    pub assessed_at: DateTime<Utc>,
}

impl ThreatAssessment {
    /// Security score used by quality scoring (1 - severity)
    pub fn security_score(&self) -> f32 {
        (1.0 - self.severity).clamp(0.0, 1.0)
    }

    pub fn is_blocked(&self) -> bool {
        self.decision == ThreatDecision::Block
    }

    pub fn is_monitored(&self) -> bool {
        self.decision == ThreatDecision::Monitor
    }

    /// Names of matched signatures
    pub fn signature_names(&self) -> Vec<String> {
        self.matches.iter().map(|m| m.signature.clone()).collect()
    }

    /// Summary reason for a block or monitor decision
    pub fn reason(&self) -> String {
        if self.risk_factors.is_empty() {
            "no risk factors".to_string()
        } else {
            self.risk_factors.join("; ")
        }
    }
}

/// Aggregate screening statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecuritySummary {
    pub total_screened: u64,
    pub allowed: u64,
    pub monitored: u64,
    pub blocked: u64,

    /// Signature hits per category
    pub category_distribution: BTreeMap<String, u64>,

    /// 1.0 when nothing suspicious has been seen
    pub security_score: f32,
}
