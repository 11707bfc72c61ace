//! Configuration for model selection

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Hardware tier cutoffs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TierCutoffs {
    pub high_min_memory_mb: u64,
    pub high_min_cores: usize,
    /// High tier additionally requires an accelerator
    pub high_requires_gpu: bool,
    pub medium_min_memory_mb: u64,
    pub medium_min_cores: usize,
}

impl Default for TierCutoffs {
    fn default() -> Self {
        Self {
            high_min_memory_mb: 16_384,
            high_min_cores: 8,
            high_requires_gpu: true,
            medium_min_memory_mb: 8_192,
            medium_min_cores: 4,
        }
    }
}

/// Model selector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub cutoffs: TierCutoffs,
    
    /// Memory kept free for the rest of the process
    pub memory_reserve_mb: u64,
    
    /// Smoothing factor for observed latency
    pub latency_ewma_alpha: f64,
    
    /// Consecutive failures after which a model is marked unreliable
    pub failure_threshold: u32,
    
    /// How long an unreliable model is skipped before it is offered again
    pub unreliable_cooldown_ms: u64,
    
    /// Complexity below which smaller models are tried first
    pub simple_query_threshold: f32,
    
    /// Models at least this large are deferred for simple queries
    pub early_exit_min_mb: u64,
    
    /// Treat the host as having an accelerator (not probed)
    pub assume_gpu: bool,
    
    /// Memory budget for resident models
    pub residency_budget_mb: u64,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            cutoffs: TierCutoffs::default(),
            memory_reserve_mb: 1_024,
            latency_ewma_alpha: 0.2,
            failure_threshold: 3,
            unreliable_cooldown_ms: 30_000,
            simple_query_threshold: 0.3,
            early_exit_min_mb: 4_096,
            assume_gpu: false,
            residency_budget_mb: 8_192,
        }
    }
}

impl SelectorConfig {
    pub fn unreliable_cooldown(&self) -> Duration {
        Duration::from_millis(self.unreliable_cooldown_ms)
    }
}
