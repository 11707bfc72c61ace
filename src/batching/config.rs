//! Configuration for adaptive batching

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Adaptive batch scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Upper bound on queries per job
    pub max_batch_size: usize,
    
    /// Size used until the regression has enough samples
    pub default_batch_size: usize,
    
    /// Longest a query waits for its job to fill
    pub max_wait_ms: u64,
    
    /// Observations kept for fitting
    pub window_size: usize,
    
    /// Observations required before the regression is used
    pub min_samples: usize,
    
    /// Refit after this many new observations
    pub refit_interval: usize,
    
    /// Ridge penalty
    pub ridge_alpha: f64,
    
    /// Per-item latency considered healthy
    pub target_item_latency_ms: u64,
    
    /// Feed dispatch outcomes back into the window
    pub adaptive_feedback: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 8,
            default_batch_size: 1,
            max_wait_ms: 500,
            window_size: 100,
            min_samples: 10,
            refit_interval: 10,
            ridge_alpha: 1.0,
            target_item_latency_ms: 2_000,
            adaptive_feedback: true,
        }
    }
}

impl BatchConfig {
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}
