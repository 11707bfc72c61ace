//! Response payload types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a result was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputationPath {
    /// Computed by the inference backend for this query
    Direct,
    /// Served from the semantic cache
    Cached,
    /// Produced by a fallback or partial computation
    Degraded,
}

/// Analytics answer returned to the caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsPayload {
    /// Natural-language answer
    pub answer: String,

    /// Named numeric metrics (e.g. `profit_margin`)
    pub metrics: BTreeMap<String, f64>,

    /// Key findings
    pub insights: Vec<String>,

    /// Suggested actions
    pub recommendations: Vec<String>,

    /// Datasets the answer was derived from
    pub data_sources: Vec<String>,
}

impl AnalyticsPayload {
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            ..Default::default()
        }
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    pub fn with_insight(mut self, insight: impl Into<String>) -> Self {
        self.insights.push(insight.into());
        self
    }

    pub fn with_data_source(mut self, source: impl Into<String>) -> Self {
        self.data_sources.push(source.into());
        self
    }

    /// Metric values in name order
    pub fn metric_values(&self) -> Vec<f64> {
        self.metrics.values().copied().collect()
    }
}
