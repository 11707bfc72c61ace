//! Tiered model selection
//!
//! Re-evaluated on every request: the host tier picks a static candidate
//! list, candidates that do not fit the current memory headroom or have
//! been failing are skipped, and the final fallback is always kept.
//! A failing model is offered again once its cooldown has passed; one more
//! failure restarts the cooldown, a success clears it.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::catalog::{ModelProfile, ModelSpec, ModelTier};
use super::config::SelectorConfig;
use super::hardware::HardwareProfile;

#[derive(Debug, Clone, Default)]
struct ModelStats {
    ewma_latency_ms: Option<f64>,
    consecutive_failures: u32,
    /// Last failure at or past the threshold
    quarantined_at: Option<Instant>,
    successes: u64,
    failures: u64,
}

/// Observed outcomes for one model
#[derive(Debug, Clone, serde::Serialize)]
pub struct ModelUsage {
    pub model_id: String,
    pub avg_latency_ms: Option<f64>,
    pub successes: u64,
    pub failures: u64,
    pub reliable: bool,
}

/// Chooses an ordered list of models for the current hardware
pub struct ModelSelector {
    config: SelectorConfig,
    stats: RwLock<HashMap<String, ModelStats>>,
}

impl ModelSelector {
    pub fn new(config: SelectorConfig) -> Self {
        Self {
            config,
            stats: RwLock::new(HashMap::new()),
        }
    }
    
    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }
    
    pub fn tier_for(&self, hardware: &HardwareProfile) -> ModelTier {
        ModelTier::classify(hardware, &self.config.cutoffs)
    }
    
    /// Ordered candidates for this request; never empty
    ///
    /// Queries with a complexity score below `simple_query_threshold` try
    /// models under `early_exit_min_mb` first. The fallback stays last.
    pub fn select(&self, hardware: &HardwareProfile, complexity: f32) -> Vec<ModelProfile> {
        let tier = self.tier_for(hardware);
        let candidates = tier.candidates();
        let headroom = hardware
            .available_memory_mb
            .saturating_sub(self.config.memory_reserve_mb);
        
        let stats = self.stats.read();
        let mut selected = Vec::with_capacity(candidates.len());
        let mut fallback = None;
        
        for (index, spec) in candidates.iter().enumerate() {
            let profile = self.profile_of(spec, stats.get(spec.id));
            if index + 1 == candidates.len() {
                fallback = Some(profile);
                continue;
            }
            
            if spec.memory_mb > headroom {
                tracing::debug!(
                    model = spec.id,
                    need_mb = spec.memory_mb,
                    headroom_mb = headroom,
                    "Skipping model: insufficient memory headroom"
                );
                continue;
            }
            if !profile.reliable {
                if self.cooling_down(stats.get(spec.id)) {
                    tracing::debug!(model = spec.id, "Skipping model: marked unreliable");
                    continue;
                }
                tracing::debug!(model = spec.id, "Offering unreliable model again after cooldown");
            }
            selected.push(profile);
        }
        drop(stats);
        
        if complexity < self.config.simple_query_threshold {
            let large = self.config.early_exit_min_mb;
            selected.sort_by_key(|p| p.memory_mb >= large);
        }
        selected.extend(fallback);
        
        tracing::trace!(
            tier = %tier,
            complexity,
            candidates = ?selected.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
            "Selected models"
        );
        selected
    }
    
    fn cooling_down(&self, stats: Option<&ModelStats>) -> bool {
        stats
            .and_then(|s| s.quarantined_at)
            .is_some_and(|at| at.elapsed() < self.config.unreliable_cooldown())
    }
    
    fn profile_of(&self, spec: &ModelSpec, stats: Option<&ModelStats>) -> ModelProfile {
        let mut profile = ModelProfile::from_spec(spec);
        if let Some(stats) = stats {
            if let Some(latency) = stats.ewma_latency_ms {
                profile.avg_latency_ms = latency;
            }
            profile.reliable = stats.consecutive_failures < self.config.failure_threshold;
        }
        profile
    }
    
    /// Record an inference outcome for latency and reliability tracking
    pub fn record_outcome(&self, model_id: &str, latency: Duration, success: bool) {
        let alpha = self.config.latency_ewma_alpha.clamp(0.0, 1.0);
        let mut stats = self.stats.write();
        let entry = stats.entry(model_id.to_string()).or_default();
        
        if success {
            let observed = latency.as_secs_f64() * 1000.0;
            entry.ewma_latency_ms = Some(match entry.ewma_latency_ms {
                Some(prev) => alpha * observed + (1.0 - alpha) * prev,
                None => observed,
            });
            entry.consecutive_failures = 0;
            entry.quarantined_at = None;
            entry.successes += 1;
        } else {
            entry.consecutive_failures += 1;
            entry.failures += 1;
            if entry.consecutive_failures >= self.config.failure_threshold {
                entry.quarantined_at = Some(Instant::now());
            }
            if entry.consecutive_failures == self.config.failure_threshold {
                tracing::warn!(model = model_id, "Model marked unreliable after repeated failures");
            }
        }
    }
    
    /// Per-model usage, sorted by id
    pub fn usage(&self) -> Vec<ModelUsage> {
        let stats = self.stats.read();
        let mut usage: Vec<ModelUsage> = stats
            .iter()
            .map(|(id, s)| ModelUsage {
                model_id: id.clone(),
                avg_latency_ms: s.ewma_latency_ms,
                successes: s.successes,
                failures: s.failures,
                reliable: s.consecutive_failures < self.config.failure_threshold,
            })
            .collect();
        usage.sort_by(|a, b| a.model_id.cmp(&b.model_id));
        usage
    }
}
