//! Audit and governance configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delivery settings for the audit trail
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// First retry delay after a failed delivery
    pub retry_initial_ms: u64,
    
    /// Ceiling for the exponential backoff
    pub retry_max_ms: u64,
    
    /// Delivery attempts per record before it is dropped
    pub max_attempts: u32,
    
    /// Longest `flush` or `shutdown` waits for the queue to drain
    pub drain_timeout_ms: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            retry_initial_ms: 50,
            retry_max_ms: 5_000,
            max_attempts: 8,
            drain_timeout_ms: 10_000,
        }
    }
}

impl AuditConfig {
    pub fn retry_initial(&self) -> Duration {
        Duration::from_millis(self.retry_initial_ms.max(1))
    }
    
    pub fn retry_max(&self) -> Duration {
        Duration::from_millis(self.retry_max_ms.max(self.retry_initial_ms).max(1))
    }
    
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
    
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

/// Human-review policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    /// Results with confidence below this are flagged for review
    pub confidence_threshold: f32,
    
    /// How long a review request stays open
    pub review_timeout_hours: i64,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            review_timeout_hours: 12,
        }
    }
}
