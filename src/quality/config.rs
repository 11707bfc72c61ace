//! Quality scoring configuration

use serde::{Deserialize, Serialize};

/// Scorer and recommendation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Base confidence for results computed by a model
    pub direct_confidence: f32,
    
    /// Base confidence for results served from cache
    pub cached_confidence: f32,
    
    /// Base confidence for fallback results
    pub degraded_confidence: f32,
    
    /// Interval half-width before any penalty
    pub base_uncertainty: f32,
    
    /// Cap on the interval half-width
    pub max_half_width: f32,
    
    /// Robust z-score above which a metric is an outlier
    pub outlier_z_threshold: f64,
    
    pub confidence_weight: f32,
    pub quality_weight: f32,
    pub security_weight: f32,
    
    pub recommendations: RecommendationThresholds,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            direct_confidence: 0.9,
            cached_confidence: 0.85,
            degraded_confidence: 0.6,
            base_uncertainty: 0.05,
            max_half_width: 0.5,
            outlier_z_threshold: 3.0,
            confidence_weight: 0.4,
            quality_weight: 0.3,
            security_weight: 0.3,
            recommendations: RecommendationThresholds::default(),
        }
    }
}

/// Triggers for operational recommendations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationThresholds {
    /// Mean inference time that suggests quantization
    pub slow_inference_ms: f64,
    
    /// Hit rate below which cache tuning is suggested
    pub low_hit_rate: f64,
    
    /// Lookups required before the hit rate is trusted
    pub min_lookups: u64,
    
    /// Entries below which pre-warming is suggested
    pub min_cache_entries: usize,
    
    /// Mean memory use that counts as pressure
    pub high_memory_mb: f64,
    
    /// Free memory fraction that counts as pressure
    pub low_memory_headroom: f64,
    
    /// Mean composite score that suggests a larger model tier
    pub low_composite: f64,
    
    pub max_recommendations: usize,
}

impl Default for RecommendationThresholds {
    fn default() -> Self {
        Self {
            slow_inference_ms: 30_000.0,
            low_hit_rate: 0.2,
            min_lookups: 20,
            min_cache_entries: 5,
            high_memory_mb: 1_000.0,
            low_memory_headroom: 0.1,
            low_composite: 0.5,
            max_recommendations: 5,
        }
    }
}
