//! Cold-start seeds for the semantic cache

use serde::{Deserialize, Serialize};

use crate::core::types::AnalyticsPayload;

/// Frequently asked MSP questions worth precomputing at startup
pub const COMMON_QUERIES: &[&str] = &[
    "What is our profit margin?",
    "Which clients are most profitable?",
    "How is our staff utilization?",
    "What are our biggest costs?",
    "Which licenses are underutilized?",
];

/// A precomputed response for a known query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSeed {
    pub query: String,
    pub payload: AnalyticsPayload,
    pub quality: f32,
}

impl CacheSeed {
    pub fn new(query: impl Into<String>, payload: AnalyticsPayload, quality: f32) -> Self {
        Self {
            query: query.into(),
            payload,
            quality,
        }
    }
}
