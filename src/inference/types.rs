//! Common types for the inference module

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::core::types::{AnalyticsPayload, ComputationPath};

/// Summary key compared against invoice totals
pub const TOTAL_REVENUE_KEY: &str = "total_revenue";

/// Unprotected output of a backend for one query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawResult {
    /// Query this result answers
    pub query_id: Uuid,
    
    /// Analytics content before noise
    pub payload: AnalyticsPayload,
    
    /// How the result was produced
    pub path: ComputationPath,
    
    /// Model that produced it
    pub model_id: String,
    
    /// Wall time spent by the backend
    pub latency_ms: u64,
    
    /// Self-reported model confidence, if the backend has one
    pub model_confidence: Option<f32>,
}

impl RawResult {
    /// Result computed directly by a model
    pub fn direct(query_id: Uuid, payload: AnalyticsPayload, model_id: impl Into<String>) -> Self {
        Self {
            query_id,
            payload,
            path: ComputationPath::Direct,
            model_id: model_id.into(),
            latency_ms: 0,
            model_confidence: None,
        }
    }
    
    pub fn with_path(mut self, path: ComputationPath) -> Self {
        self.path = path;
        self
    }
    
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }
    
    pub fn with_model_confidence(mut self, confidence: f32) -> Self {
        self.model_confidence = Some(confidence.clamp(0.0, 1.0));
        self
    }
}

/// Read-only view of the tabular records behind a query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataSnapshot {
    pub clients: usize,
    pub invoices: usize,
    pub time_logs: usize,
    pub licenses: usize,
    
    /// Sum of invoice amounts
    pub invoice_total: f64,
    
    /// Precomputed summary statistics
    pub summary: BTreeMap<String, f64>,
    
    pub captured_at: Option<DateTime<Utc>>,
}

impl DataSnapshot {
    pub fn new(clients: usize, invoices: usize, time_logs: usize, licenses: usize) -> Self {
        Self {
            clients,
            invoices,
            time_logs,
            licenses,
            invoice_total: 0.0,
            summary: BTreeMap::new(),
            captured_at: Some(Utc::now()),
        }
    }
    
    pub fn with_invoice_total(mut self, total: f64) -> Self {
        self.invoice_total = total;
        self
    }
    
    pub fn with_summary(mut self, key: impl Into<String>, value: f64) -> Self {
        self.summary.insert(key.into(), value);
        self
    }
    
    /// Names of datasets with no records
    pub fn missing_datasets(&self) -> Vec<&'static str> {
        [
            ("clients", self.clients),
            ("invoices", self.invoices),
            ("time_logs", self.time_logs),
            ("licenses", self.licenses),
        ]
        .into_iter()
        .filter(|(_, count)| *count == 0)
        .map(|(name, _)| name)
        .collect()
    }
    
    /// Fraction of the four datasets that have records
    pub fn completeness(&self) -> f32 {
        1.0 - self.missing_datasets().len() as f32 / 4.0
    }
    
    /// Whether reported revenue disagrees with invoices by more than 20%
    pub fn revenue_inconsistent(&self) -> bool {
        let reported = self.summary.get(TOTAL_REVENUE_KEY).copied().unwrap_or(0.0);
        let expected = self.invoice_total;
        if expected > 0.0 && reported > 0.0 {
            expected.min(reported) / expected.max(reported) < 0.8
        } else {
            false
        }
    }
    
    /// Data quality in [0, 1]: 0.2 lost per empty dataset and for inconsistent revenue
    pub fn data_quality(&self) -> f32 {
        let mut quality = 1.0 - 0.2 * self.missing_datasets().len() as f32;
        if self.revenue_inconsistent() {
            quality -= 0.2;
        }
        quality.max(0.0)
    }
}
