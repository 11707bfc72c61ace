//! Pipeline construction

use std::sync::Arc;

use crate::audit::{AuditSink, AuditTrail, ConfidenceGate, TracingAuditSink};
use crate::batching::{AdaptiveBatchScheduler, LoadProbe, SystemLoadProbe};
use crate::cache::SemanticCache;
use crate::core::config::PipelineConfig;
use crate::core::error::Result;
use crate::embeddings::FeatureEmbedder;
use crate::inference::{InferenceBackend, StaticTabularSource, TabularSource};
use crate::logging::MetricsCollector;
use crate::privacy::{PassthroughSecureComputation, PrivacyGuard, QuerySanitizer, SecureComputation};
use crate::quality::{QualityScorer, RecommendationEngine};
use crate::screening::ThreatScreener;
use crate::selector::{HardwareProbe, ModelSelector, ResidencyTracker, SystemHardwareProbe};

use super::engine::QueryPipeline;
use super::executor::PipelineExecutor;

/// Assembles a [`QueryPipeline`] from its configuration and collaborators.
///
/// Only the inference backend is required; everything else has a default.
/// `build` spawns the audit worker and must run inside a tokio runtime.
pub struct PipelineBuilder {
    config: PipelineConfig,
    backend: Arc<dyn InferenceBackend>,
    tabular: Option<Arc<dyn TabularSource>>,
    audit_sink: Option<Arc<dyn AuditSink>>,
    hardware: Option<Arc<dyn HardwareProbe>>,
    load: Option<Arc<dyn LoadProbe>>,
    secure: Option<Arc<dyn SecureComputation>>,
    metrics: Option<Arc<MetricsCollector>>,
    privacy_seed: Option<u64>,
}

impl PipelineBuilder {
    pub fn new(config: PipelineConfig, backend: Arc<dyn InferenceBackend>) -> Self {
        Self {
            config,
            backend,
            tabular: None,
            audit_sink: None,
            hardware: None,
            load: None,
            secure: None,
            metrics: None,
            privacy_seed: None,
        }
    }

    pub fn with_backend(mut self, backend: Arc<dyn InferenceBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_tabular(mut self, source: Arc<dyn TabularSource>) -> Self {
        self.tabular = Some(source);
        self
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit_sink = Some(sink);
        self
    }

    pub fn with_hardware_probe(mut self, probe: Arc<dyn HardwareProbe>) -> Self {
        self.hardware = Some(probe);
        self
    }

    pub fn with_load_probe(mut self, probe: Arc<dyn LoadProbe>) -> Self {
        self.load = Some(probe);
        self
    }

    pub fn with_secure(mut self, secure: Arc<dyn SecureComputation>) -> Self {
        self.secure = Some(secure);
        self
    }

    /// Share a collector, e.g. the one owned by `LoggingSystem`
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Deterministic noise, for tests and reproducible runs
    pub fn with_privacy_seed(mut self, seed: u64) -> Self {
        self.privacy_seed = Some(seed);
        self
    }

    pub fn build(self) -> Result<QueryPipeline> {
        let PipelineBuilder {
            config,
            backend,
            tabular,
            audit_sink,
            hardware,
            load,
            secure,
            metrics,
            privacy_seed,
        } = self;

        config.validate()?;

        let metrics =
            metrics.unwrap_or_else(|| Arc::new(MetricsCollector::with_capacity(config.logging.metrics_history)));
        let hardware: Arc<dyn HardwareProbe> =
            hardware.unwrap_or_else(|| Arc::new(SystemHardwareProbe::new(config.selector.assume_gpu)));
        let load: Arc<dyn LoadProbe> = load.unwrap_or_else(|| Arc::new(SystemLoadProbe::new()));

        let screener = ThreatScreener::new(config.screening.clone())?;
        let embedder = FeatureEmbedder::new(config.embedding.clone())?;
        let cache = SemanticCache::new(config.cache.clone(), embedder.dimension());
        let sanitizer = QuerySanitizer::with_custom(&config.privacy.custom_redactions)?;
        let privacy = match privacy_seed {
            Some(seed) => PrivacyGuard::with_seed(config.privacy.clone(), seed)?,
            None => PrivacyGuard::new(config.privacy.clone())?,
        };

        let selector = Arc::new(ModelSelector::new(config.selector.clone()));
        let residency = ResidencyTracker::new(config.selector.residency_budget_mb);
        let executor = PipelineExecutor::new(
            backend,
            Arc::clone(&selector),
            residency.clone(),
            Arc::clone(&hardware),
            config.timeouts.inference(),
            Arc::clone(&metrics),
        );
        let scheduler = AdaptiveBatchScheduler::new(config.batching.clone(), Arc::new(executor), Arc::clone(&load));

        let audit = AuditTrail::spawn(
            audit_sink.unwrap_or_else(|| Arc::new(TracingAuditSink)),
            config.audit.clone(),
        );

        tracing::info!(
            dimension = embedder.dimension(),
            cache_capacity = config.cache.capacity,
            epsilon = config.privacy.total_epsilon,
            max_batch = config.batching.max_batch_size,
            "Query pipeline assembled"
        );

        Ok(QueryPipeline {
            screener,
            embedder,
            cache,
            sanitizer,
            privacy,
            selector,
            residency,
            hardware,
            load,
            scheduler,
            scorer: QualityScorer::new(config.quality.clone()),
            gate: ConfidenceGate::new(config.governance.clone()),
            recommender: RecommendationEngine::new(config.quality.recommendations.clone()),
            tabular: tabular.unwrap_or_else(|| Arc::new(StaticTabularSource::default())),
            secure: secure.unwrap_or_else(|| Arc::new(PassthroughSecureComputation)),
            audit,
            metrics,
            config,
        })
    }
}
