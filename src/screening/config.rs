//! Configuration for threat screening

use serde::{Deserialize, Serialize};

use super::types::ThreatCategory;

/// Threat screening configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreeningConfig {
    /// Severity at or above which a query is blocked
    pub block_threshold: f32,

    /// Severity at or above which a query is monitored
    pub monitor_threshold: f32,

    /// Z-score at which length or symbol density becomes anomalous
    pub anomaly_z_threshold: f64,

    /// Highest severity the anomaly detector alone may assign
    pub anomaly_severity_cap: f32,

    /// Rolling baseline size
    pub baseline_window: usize,

    /// Samples required before the anomaly detector is active
    pub baseline_min_samples: usize,

    /// Queries longer than this are flagged regardless of the baseline
    pub max_query_chars: usize,

    /// Additional operator-supplied signatures
    pub extra_signatures: Vec<CustomSignature>,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            block_threshold: 0.8,
            monitor_threshold: 0.4,
            anomaly_z_threshold: 3.0,
            anomaly_severity_cap: 0.7,
            baseline_window: 500,
            baseline_min_samples: 30,
            max_query_chars: 2_000,
            extra_signatures: Vec::new(),
        }
    }
}

/// A signature defined in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomSignature {
    pub name: String,
    pub pattern: String,
    pub category: ThreatCategory,
    pub severity: f32,
}
