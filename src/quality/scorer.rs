//! Confidence, uncertainty and composite scoring

use chrono::Utc;
use tracing::debug;

use super::complexity::ComplexityEstimate;
use super::config::QualityConfig;
use super::types::{PenaltyBreakdown, QualityReport};
use crate::core::types::ComputationPath;
use crate::inference::{DataSnapshot, RawResult};
use crate::screening::ThreatAssessment;

/// Scale applied to the median absolute deviation
const MAD_SCALE: f64 = 0.6745;

/// Scores raw results
#[derive(Debug, Clone)]
pub struct QualityScorer {
    config: QualityConfig,
}

impl QualityScorer {
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    pub fn base_confidence(&self, path: ComputationPath) -> f32 {
        match path {
            ComputationPath::Direct => self.config.direct_confidence,
            ComputationPath::Cached => self.config.cached_confidence,
            ComputationPath::Degraded => self.config.degraded_confidence,
        }
    }

    pub fn score(
        &self,
        result: &RawResult,
        assessment: &ThreatAssessment,
        complexity: &ComplexityEstimate,
        data: &DataSnapshot,
    ) -> QualityReport {
        let mut base = self.base_confidence(result.path);
        if let Some(model_confidence) = result.model_confidence {
            base = base.min(model_confidence);
        }

        let values = result.payload.metric_values();
        let data_quality = data.data_quality();

        let penalties = PenaltyBreakdown {
            missing_inputs: 0.3 * (1.0 - data_quality) + 0.2 * zero_fraction(&values),
            outliers: 0.2 * outlier_fraction(&values, self.config.outlier_z_threshold),
            complexity: complexity_penalty(complexity),
        };
        let penalty = penalties.total();

        let confidence = (base - penalty).clamp(0.0, 1.0);
        let half_width = (self.config.base_uncertainty + penalty).min(self.config.max_half_width);
        let lower_bound = (confidence - half_width).max(0.0);
        let upper_bound = (confidence + half_width).min(1.0);

        let security = assessment.security_score();
        let quality = ((confidence + (1.0 - half_width) + security + data_quality) / 4.0)
            .clamp(0.0, 1.0);

        let composite = (self.config.confidence_weight * confidence
            + self.config.quality_weight * quality
            + self.config.security_weight * security)
            .clamp(0.0, 1.0);

        debug!(
            query_id = %result.query_id,
            path = ?result.path,
            confidence,
            half_width,
            composite,
            penalty,
            "Scored result"
        );

        QualityReport {
            confidence,
            quality,
            security,
            lower_bound,
            upper_bound,
            composite,
            penalties,
            path: result.path,
            created_at: Utc::now(),
        }
    }
}

fn complexity_penalty(complexity: &ComplexityEstimate) -> f32 {
    let mut penalty = 0.2 * complexity.score.clamp(0.0, 1.0);
    if complexity.multi_part {
        penalty += 0.1;
    }
    if complexity.cross_correlation {
        penalty += 0.1;
    }
    penalty
}

/// Share of metrics that are zero or not finite
pub fn zero_fraction(values: &[f64]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let zeros = values.iter().filter(|v| !v.is_finite() || **v == 0.0).count();
    zeros as f32 / values.len() as f32
}

/// Share of finite metrics whose robust z-score exceeds `threshold`.
///
/// Uses the median absolute deviation; needs at least three values. When the
/// deviation is zero every value off the median counts.
pub fn outlier_fraction(values: &[f64], threshold: f64) -> f32 {
    let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.len() < 3 {
        return 0.0;
    }

    let median = median_of(&mut finite);
    let mut deviations: Vec<f64> = finite.iter().map(|v| (v - median).abs()).collect();
    let mad = median_of(&mut deviations);

    let outliers = finite
        .iter()
        .filter(|v| {
            let deviation = (*v - median).abs();
            if mad > 0.0 {
                MAD_SCALE * deviation / mad > threshold
            } else {
                deviation > 0.0
            }
        })
        .count();

    outliers as f32 / finite.len() as f32
}

fn median_of(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}
