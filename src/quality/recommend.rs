//! Operational recommendations from pipeline metrics

use serde::{Deserialize, Serialize};

use super::config::RecommendationThresholds;

/// Effect of storing weights at reduced precision
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantizationEstimate {
    pub bits: u8,
    pub original_mb: f64,
    pub compressed_mb: f64,
    pub compression_ratio: f64,
    pub accuracy_retention: f64,
    pub speedup: f64,
}

impl QuantizationEstimate {
    /// Estimate relative to 32-bit weights. 8-bit keeps ~95% accuracy at 2x
    /// speed, 4-bit ~85% at 4x; other widths are treated as lossless.
    pub fn simulate(model_mb: f64, bits: u8) -> Self {
        let bits = bits.clamp(1, 32);
        let compression_ratio = 32.0 / bits as f64;
        let (accuracy_retention, speedup) = match bits {
            8 => (0.95, 2.0),
            4 => (0.85, 4.0),
            _ => (1.0, 1.0),
        };
        Self {
            bits,
            original_mb: model_mb,
            compressed_mb: model_mb / compression_ratio,
            compression_ratio,
            accuracy_retention,
            speedup,
        }
    }

    pub fn memory_saved_mb(&self) -> f64 {
        self.original_mb - self.compressed_mb
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    Quantization,
    CacheTuning,
    CachePrewarm,
    PrivacyRefresh,
    MemoryPressure,
    LowQuality,
}

/// One suggested operator action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub message: String,
    pub quantization: Option<QuantizationEstimate>,
}

impl Recommendation {
    fn new(kind: RecommendationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            quantization: None,
        }
    }
}

/// Aggregates the recommendation rules look at
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceInputs {
    /// Samples behind the averages below
    pub samples: u64,
    pub avg_inference_ms: f64,
    pub avg_memory_mb: f64,
    pub avg_composite: f64,
    pub cache_hit_rate: f64,
    pub cache_lookups: u64,
    pub cache_entries: usize,
    pub privacy_remaining_fraction: f64,
    pub privacy_low: bool,
    pub memory_headroom: f64,
    /// Footprint of the largest model currently selected
    pub largest_model: Option<(String, u64)>,
}

/// Turns performance aggregates into recommendations
#[derive(Debug, Clone, Default)]
pub struct RecommendationEngine {
    thresholds: RecommendationThresholds,
}

impl RecommendationEngine {
    pub fn new(thresholds: RecommendationThresholds) -> Self {
        Self { thresholds }
    }

    /// Ordered by urgency, at most `max_recommendations`
    pub fn recommend(&self, inputs: &PerformanceInputs) -> Vec<Recommendation> {
        let t = &self.thresholds;
        let mut out = Vec::new();

        if inputs.privacy_low {
            out.push(Recommendation::new(
                RecommendationKind::PrivacyRefresh,
                format!(
                    "Privacy budget low ({:.0}% remaining) - refresh privacy parameters",
                    inputs.privacy_remaining_fraction * 100.0
                ),
            ));
        }

        if inputs.samples > 0 && inputs.avg_inference_ms > t.slow_inference_ms {
            let mut rec = Recommendation::new(
                RecommendationKind::Quantization,
                "Consider model quantization to reduce inference time",
            );
            if let Some((model_id, memory_mb)) = &inputs.largest_model {
                let estimate = QuantizationEstimate::simulate(*memory_mb as f64, 8);
                rec.message = format!(
                    "Consider 8-bit quantization of {}: ~{:.0} MB, {:.1}x faster, {:.0}% accuracy retained",
                    model_id,
                    estimate.compressed_mb,
                    estimate.speedup,
                    estimate.accuracy_retention * 100.0
                );
                rec.quantization = Some(estimate);
            }
            out.push(rec);
        }

        if (inputs.samples > 0 && inputs.avg_memory_mb > t.high_memory_mb)
            || inputs.memory_headroom < t.low_memory_headroom
        {
            out.push(Recommendation::new(
                RecommendationKind::MemoryPressure,
                "Memory pressure high - prefer a lower model tier or quantized weights",
            ));
        }

        if inputs.cache_lookups >= t.min_lookups && inputs.cache_hit_rate < t.low_hit_rate {
            out.push(Recommendation::new(
                RecommendationKind::CacheTuning,
                "Increase cache size or adjust similarity threshold",
            ));
        }

        if inputs.cache_entries < t.min_cache_entries {
            out.push(Recommendation::new(
                RecommendationKind::CachePrewarm,
                "Pre-warm the cache with common analytics queries",
            ));
        }

        if inputs.samples > 0 && inputs.avg_composite < t.low_composite {
            out.push(Recommendation::new(
                RecommendationKind::LowQuality,
                "Result quality is low - check data completeness or allow a larger model tier",
            ));
        }

        out.truncate(t.max_recommendations);
        out
    }
}
