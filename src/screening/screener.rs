//! Threat screener
//!
//! Runs the ordered signature set and the statistical anomaly detector
//! over the raw query text, then maps the combined severity to a
//! decision.

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::types::Query;
use crate::core::utils::truncate_string;

use super::baseline::{QueryShape, RollingBaseline};
use super::config::ScreeningConfig;
use super::error::ScreeningResult;
use super::signatures::SignatureSet;
use super::types::{
    PatternMatch, SecuritySummary, ThreatAssessment, ThreatCategory, ThreatDecision,
};

/// Extra severity when signatures from several families fire together
const MULTI_CATEGORY_BONUS: f32 = 0.1;

/// Stateless-per-query screener with a separately locked baseline
pub struct ThreatScreener {
    config: ScreeningConfig,
    signatures: SignatureSet,
    baseline: RwLock<RollingBaseline>,
    total_screened: AtomicU64,
    decisions: DashMap<ThreatDecision, u64>,
    category_hits: DashMap<ThreatCategory, u64>,
}

impl ThreatScreener {
    pub fn new(config: ScreeningConfig) -> ScreeningResult<Self> {
        let signatures = SignatureSet::with_custom(&config.extra_signatures)?;
        let baseline = RollingBaseline::new(config.baseline_window, config.baseline_min_samples);
        Ok(Self {
            config,
            signatures,
            baseline: RwLock::new(baseline),
            total_screened: AtomicU64::new(0),
            decisions: DashMap::new(),
            category_hits: DashMap::new(),
        })
    }

    pub fn config(&self) -> &ScreeningConfig {
        &self.config
    }

    /// Screen a query's raw text
    pub fn screen(&self, query: &Query) -> ThreatAssessment {
        let text = query.text.as_str();
        let mut matches = Vec::new();
        let mut risk_factors = Vec::new();

        for signature in self.signatures.iter() {
            if let Some(fragment) = signature.find(text) {
                risk_factors.push(format!("{} ({})", signature.name, signature.category));
                matches.push(PatternMatch {
                    signature: signature.name.clone(),
                    category: signature.category,
                    severity: signature.severity,
                    fragment: truncate_string(fragment, 64),
                });
            }
        }

        let mut pattern_severity = matches
            .iter()
            .map(|m| m.severity)
            .fold(0.0f32, f32::max);
        let categories: BTreeSet<ThreatCategory> = matches.iter().map(|m| m.category).collect();
        if categories.len() > 1 {
            pattern_severity += MULTI_CATEGORY_BONUS;
            risk_factors.push(format!("{} threat families matched", categories.len()));
        }

        let shape = QueryShape::of(text);
        let anomaly_z = self.baseline.read().z_score(&shape).unwrap_or(0.0);
        let mut anomaly_severity = 0.0f32;
        if anomaly_z >= self.config.anomaly_z_threshold {
            let excess = (anomaly_z - self.config.anomaly_z_threshold) as f32;
            anomaly_severity = (self.config.monitor_threshold + 0.05 * excess)
                .min(self.config.anomaly_severity_cap);
            risk_factors.push(format!("unusual query shape (z={anomaly_z:.1})"));
        }
        if shape.length as usize > self.config.max_query_chars {
            anomaly_severity = anomaly_severity
                .max(self.config.monitor_threshold)
                .min(self.config.anomaly_severity_cap);
            risk_factors.push(format!("query exceeds {} characters", self.config.max_query_chars));
        }

        let severity = pattern_severity.max(anomaly_severity).clamp(0.0, 1.0);
        let decision = self.decide(severity);

        self.record(&matches, anomaly_severity, decision);
        if decision == ThreatDecision::Allow {
            self.baseline.write().observe(shape);
        }

        match decision {
            ThreatDecision::Block => tracing::warn!(
                query_id = %query.id,
                severity,
                signatures = ?matches.iter().map(|m| m.signature.as_str()).collect::<Vec<_>>(),
                "Query blocked"
            ),
            ThreatDecision::Monitor => tracing::info!(
                query_id = %query.id,
                severity,
                "Query monitored"
            ),
            ThreatDecision::Allow => tracing::trace!(query_id = %query.id, "Query allowed"),
        }

        ThreatAssessment {
            query_id: query.id,
            matches,
            anomaly_z,
            anomaly_severity,
            severity,
            decision,
            risk_factors,
            assessed_at: Utc::now(),
        }
    }

    fn decide(&self, severity: f32) -> ThreatDecision {
        if severity >= self.config.block_threshold {
            ThreatDecision::Block
        } else if severity >= self.config.monitor_threshold {
            ThreatDecision::Monitor
        } else {
            ThreatDecision::Allow
        }
    }

    fn record(&self, matches: &[PatternMatch], anomaly_severity: f32, decision: ThreatDecision) {
        self.total_screened.fetch_add(1, Ordering::Relaxed);
        *self.decisions.entry(decision).or_insert(0) += 1;
        for m in matches {
            *self.category_hits.entry(m.category).or_insert(0) += 1;
        }
        if anomaly_severity > 0.0 {
            *self.category_hits.entry(ThreatCategory::Anomaly).or_insert(0) += 1;
        }
    }

    /// Decision counts, per-category hits and a derived security score
    pub fn security_summary(&self) -> SecuritySummary {
        let count = |d: ThreatDecision| self.decisions.get(&d).map(|v| *v).unwrap_or(0);
        let total = self.total_screened.load(Ordering::Relaxed);
        let allowed = count(ThreatDecision::Allow);
        let monitored = count(ThreatDecision::Monitor);
        let blocked = count(ThreatDecision::Block);

        let category_distribution: BTreeMap<String, u64> = self
            .category_hits
            .iter()
            .map(|entry| (entry.key().as_str().to_string(), *entry.value()))
            .collect();

        let security_score = if total == 0 {
            1.0
        } else {
            (1.0 - (blocked as f32 + 0.5 * monitored as f32) / total as f32).clamp(0.0, 1.0)
        };

        SecuritySummary {
            total_screened: total,
            allowed,
            monitored,
            blocked,
            category_distribution,
            security_score,
        }
    }

    /// Number of samples in the anomaly baseline
    pub fn baseline_len(&self) -> usize {
        self.baseline.read().len()
    }
}
