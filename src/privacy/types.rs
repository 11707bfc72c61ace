//! Privacy types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Noise mechanism
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseMechanism {
    /// Single point values, scale b = Δ/ε
    Laplace,
    /// Several values composed, σ = √(2 ln(1.25/δ))·Δ/ε
    Gaussian,
}

impl NoiseMechanism {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoiseMechanism::Laplace => "laplace",
            NoiseMechanism::Gaussian => "gaussian",
        }
    }
}

impl fmt::Display for NoiseMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Privacy level selecting ε per release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyLevel {
    Minimal,
    Standard,
    High,
}

impl PrivacyLevel {
    pub fn epsilon(&self) -> f64 {
        match self {
            PrivacyLevel::Minimal => 0.01,
            PrivacyLevel::Standard => 0.1,
            PrivacyLevel::High => 0.5,
        }
    }
}

/// A value with noise applied
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProtectedValue {
    pub value: f64,
    pub epsilon_spent: f64,
    pub mechanism: NoiseMechanism,
    pub epoch: u64,
}

/// Several values protected under one budget charge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtectedBatch {
    pub values: Vec<f64>,
    pub epsilon_spent: f64,
    pub mechanism: NoiseMechanism,
    pub epoch: u64,
}

/// Privacy already applied to a cached payload
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrivacyMarker {
    pub epsilon_spent: f64,
    /// `None` when the payload had no numeric values to protect
    pub mechanism: Option<NoiseMechanism>,
    pub epoch: u64,
}

/// One budget charge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub mechanism: NoiseMechanism,
    pub epsilon: f64,
    /// Composed δ of the charge; zero for pure ε mechanisms
    pub delta: f64,
    pub sensitivity: f64,
    pub value_count: usize,
    pub epoch: u64,
    pub recorded_at: DateTime<Utc>,
}

/// Point-in-time view of the budget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetSnapshot {
    pub total_epsilon: f64,
    pub consumed_epsilon: f64,
    pub remaining_epsilon: f64,
    pub delta: f64,
    pub epoch: u64,
    /// Charges in the current epoch
    pub operations: usize,
    /// Charges per mechanism in the current epoch
    pub mechanism_usage: BTreeMap<String, u64>,
    pub is_exhausted: bool,
    /// Remaining budget below the configured warning fraction
    pub is_low: bool,
}

impl BudgetSnapshot {
    pub fn remaining_fraction(&self) -> f64 {
        if self.total_epsilon > 0.0 {
            self.remaining_epsilon / self.total_epsilon
        } else {
            0.0
        }
    }
}
