//! Configuration for the privacy guard

use serde::{Deserialize, Serialize};

use super::types::PrivacyLevel;

/// Differential-privacy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivacyConfig {
    /// Total ε available per epoch
    pub total_epsilon: f64,
    
    /// δ for the Gaussian mechanism
    pub delta: f64,
    
    /// Level selecting ε per release
    pub level: PrivacyLevel,
    
    /// Sensitivity as a fraction of each released value's magnitude
    pub relative_sensitivity: f64,
    
    /// Lower bound on sensitivity
    pub min_sensitivity: f64,
    
    /// Remaining fraction below which a refresh is recommended
    pub low_budget_fraction: f64,
    
    /// Seal report confidence through the secure computation backend
    pub seal_confidence: bool,
    
    /// Redact personal identifiers from query text
    pub sanitize_queries: bool,
    
    /// Extra redaction patterns (regex strings)
    pub custom_redactions: Vec<String>,
}

impl Default for PrivacyConfig {
    fn default() -> Self {
        Self {
            total_epsilon: 1.0,
            delta: 1e-5,
            level: PrivacyLevel::Standard,
            relative_sensitivity: 0.05,
            min_sensitivity: 0.01,
            low_budget_fraction: 0.1,
            seal_confidence: false,
            sanitize_queries: true,
            custom_redactions: Vec::new(),
        }
    }
}

impl PrivacyConfig {
    /// ε charged per protected release
    pub fn epsilon_per_release(&self) -> f64 {
        self.level.epsilon()
    }
    
    /// Sensitivity for a released value
    pub fn sensitivity_for(&self, value: f64) -> f64 {
        (value.abs() * self.relative_sensitivity).max(self.min_sensitivity)
    }
}
