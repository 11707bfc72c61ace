//! Model tiers and the static candidate catalog

use serde::{Deserialize, Serialize};
use std::fmt;

use super::config::TierCutoffs;
use super::hardware::HardwareProfile;

/// Hardware capability tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    Low,
    Medium,
    High,
}

impl ModelTier {
    /// Tier supported by a host
    pub fn classify(profile: &HardwareProfile, cutoffs: &TierCutoffs) -> Self {
        let gpu_ok = !cutoffs.high_requires_gpu || profile.has_gpu;
        if profile.total_memory_mb >= cutoffs.high_min_memory_mb
            && profile.cpu_cores >= cutoffs.high_min_cores
            && gpu_ok
        {
            ModelTier::High
        } else if profile.total_memory_mb >= cutoffs.medium_min_memory_mb
            && profile.cpu_cores >= cutoffs.medium_min_cores
        {
            ModelTier::Medium
        } else {
            ModelTier::Low
        }
    }
    
    /// Ordered candidates; the last entry is always the smallest, most reliable model
    pub fn candidates(&self) -> &'static [ModelSpec] {
        match self {
            ModelTier::High => &[LLAMA3_8B, PHI3_MINI, TINYLLAMA],
            ModelTier::Medium => &[PHI3_MINI, TINYLLAMA],
            ModelTier::Low => &[TINYLLAMA],
        }
    }
    
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelTier::Low => "low",
            ModelTier::Medium => "medium",
            ModelTier::High => "high",
        }
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static description of a model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSpec {
    pub id: &'static str,
    /// Tier the model itself belongs to
    pub tier: ModelTier,
    pub memory_mb: u64,
    /// Latency assumed before any observation
    pub baseline_latency_ms: u64,
}

pub const LLAMA3_8B: ModelSpec = ModelSpec {
    id: "llama3:8b",
    tier: ModelTier::High,
    memory_mb: 4_700,
    baseline_latency_ms: 12_000,
};

pub const PHI3_MINI: ModelSpec = ModelSpec {
    id: "phi3:mini",
    tier: ModelTier::Medium,
    memory_mb: 2_300,
    baseline_latency_ms: 6_000,
};

pub const TINYLLAMA: ModelSpec = ModelSpec {
    id: "tinyllama",
    tier: ModelTier::Low,
    memory_mb: 640,
    baseline_latency_ms: 2_500,
};

/// A candidate model with its observed behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelProfile {
    pub id: String,
    pub tier: ModelTier,
    pub memory_mb: u64,
    /// Exponentially weighted average latency
    pub avg_latency_ms: f64,
    pub reliable: bool,
}

impl ModelProfile {
    pub fn from_spec(spec: &ModelSpec) -> Self {
        Self {
            id: spec.id.to_string(),
            tier: spec.tier,
            memory_mb: spec.memory_mb,
            avg_latency_ms: spec.baseline_latency_ms as f64,
            reliable: true,
        }
    }
}
