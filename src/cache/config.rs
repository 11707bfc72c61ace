//! Configuration for the semantic cache

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Semantic cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of entries
    pub capacity: usize,
    
    /// Minimum cosine similarity for a hit
    pub similarity_threshold: f32,
    
    /// Idle time after which an entry's retention score halves
    pub half_life_secs: u64,
    
    /// Idle time after which an entry's retention score is zero
    pub max_idle_secs: u64,
    
    /// Forced expiry for entries produced by monitored queries
    pub monitored_ttl_secs: u64,
    
    /// Expiry for ordinary entries (none when unset)
    pub entry_ttl_secs: Option<u64>,
    
    /// Similarity above which an insert replaces an existing entry
    pub duplicate_similarity: f32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1_000,
            similarity_threshold: 0.85,
            half_life_secs: 3_600,
            max_idle_secs: 86_400,
            monitored_ttl_secs: 60,
            entry_ttl_secs: Some(3_600),
            duplicate_similarity: 0.999,
        }
    }
}

impl CacheConfig {
    pub fn half_life(&self) -> Duration {
        Duration::from_secs(self.half_life_secs)
    }
    
    pub fn max_idle(&self) -> Duration {
        Duration::from_secs(self.max_idle_secs)
    }
    
    pub fn monitored_ttl(&self) -> Duration {
        Duration::from_secs(self.monitored_ttl_secs)
    }
    
    pub fn entry_ttl(&self) -> Option<Duration> {
        self.entry_ttl_secs.map(Duration::from_secs)
    }
}
