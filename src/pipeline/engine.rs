//! Query pipeline
//!
//! One query flows through:
//! 1. Sanitization and threat screening (blocked queries stop here)
//! 2. Embedding and semantic cache lookup
//! 3. On a miss, adaptive batching and inference
//! 4. Quality scoring and differential privacy
//! 5. Cache insertion, governance gate and audit

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::audit::{AuditEvent, AuditStats, AuditTrail, ConfidenceGate, ReviewStatus};
use crate::batching::{AdaptiveBatchScheduler, BatchError, LoadProbe};
use crate::cache::{CacheHit, CacheSeed, InsertOptions, LookupOutcome, SemanticCache, COMMON_QUERIES};
use crate::core::config::PipelineConfig;
use crate::core::error::{PipelineError, Result, Stage};
use crate::core::types::{AnalyticsPayload, ComputationPath, Query};
use crate::core::utils::pseudonymize;
use crate::embeddings::FeatureEmbedder;
use crate::inference::{DataSnapshot, InferenceBackend, RawResult, TabularSource};
use crate::logging::{names, MetricsCollector};
use crate::privacy::{BudgetSnapshot, PrivacyError, PrivacyGuard, PrivacyMarker, QuerySanitizer, SecureComputation};
use crate::quality::{ComplexityEstimate, PerformanceInputs, QualityReport, QualityScorer, RecommendationEngine};
use crate::screening::{ThreatAssessment, ThreatScreener};
use crate::selector::{HardwareProbe, ModelSelector, ResidencyTracker};

use super::builder::PipelineBuilder;
use super::response::{PerformanceReport, PipelineResponse, ThreatAnnotation};

/// Per-query identity shared by every audit record of that query
struct QueryScope<'a> {
    id: Uuid,
    caller: Option<&'a str>,
}

impl QueryScope<'_> {
    /// Cache visibility key for monitored entries
    fn owner(&self) -> String {
        match self.caller {
            Some(digest) => digest.to_string(),
            None => self.id.to_string(),
        }
    }
}

/// The query optimization and protection pipeline
pub struct QueryPipeline {
    pub(super) screener: ThreatScreener,
    pub(super) embedder: FeatureEmbedder,
    pub(super) cache: SemanticCache,
    pub(super) sanitizer: QuerySanitizer,
    pub(super) privacy: PrivacyGuard,
    pub(super) selector: Arc<ModelSelector>,
    pub(super) residency: ResidencyTracker,
    pub(super) hardware: Arc<dyn HardwareProbe>,
    pub(super) load: Arc<dyn LoadProbe>,
    pub(super) scheduler: AdaptiveBatchScheduler,
    pub(super) scorer: QualityScorer,
    pub(super) gate: ConfidenceGate,
    pub(super) recommender: RecommendationEngine,
    pub(super) tabular: Arc<dyn TabularSource>,
    pub(super) secure: Arc<dyn SecureComputation>,
    pub(super) audit: AuditTrail,
    pub(super) metrics: Arc<MetricsCollector>,
    pub(super) config: PipelineConfig,
}

impl QueryPipeline {
    pub fn builder(config: PipelineConfig, backend: Arc<dyn InferenceBackend>) -> PipelineBuilder {
        PipelineBuilder::new(config, backend)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        Arc::clone(&self.metrics)
    }

    pub fn cache(&self) -> &SemanticCache {
        &self.cache
    }

    pub fn privacy(&self) -> &PrivacyGuard {
        &self.privacy
    }

    pub fn screener(&self) -> &ThreatScreener {
        &self.screener
    }

    pub fn scheduler(&self) -> &AdaptiveBatchScheduler {
        &self.scheduler
    }

    /// Answer an analytics question.
    ///
    /// Every error path leaves an `Error` audit record for the query.
    pub async fn submit_query(&self, text: &str, context: HashMap<String, String>) -> Result<PipelineResponse> {
        let started = Instant::now();
        let query = Query::new(text, context);
        let caller = query.caller_id().map(pseudonymize);
        let scope = QueryScope {
            id: query.id,
            caller: caller.as_deref(),
        };

        let span = info_span!("query", query_id = %scope.id, category = query.category.as_str());
        let outcome = self.process(query, &scope).instrument(span).await;

        let elapsed = started.elapsed();
        self.metrics.record_duration(names::QUERY_LATENCY, elapsed);

        let outcome = match outcome {
            Ok(mut response) => {
                response.duration_ms = elapsed.as_millis() as u64;
                info!(
                    query_id = %scope.id,
                    cache_hit = response.cache_hit,
                    composite = response.report.composite,
                    duration_ms = response.duration_ms,
                    "Query answered"
                );
                Ok(response)
            }
            Err(err) => {
                self.metrics.increment(names::QUERY_ERRORS);
                match &err {
                    PipelineError::ModelUnavailable { reason } => {
                        error!(query_id = %scope.id, reason = %reason, "Query failed: no model available")
                    }
                    PipelineError::SecurityBlocked { .. } => {}
                    other => warn!(query_id = %scope.id, error = %other, "Query failed"),
                }
                self.record(
                    &scope,
                    AuditEvent::Error {
                        code: err.code().to_string(),
                        message: err.to_string(),
                        stage: stage_of(&err),
                    },
                );
                Err(err)
            }
        };

        self.audit.finish_query(scope.id);
        outcome
    }

    async fn process(&self, query: Query, scope: &QueryScope<'_>) -> Result<PipelineResponse> {
        if query.text.trim().is_empty() {
            return Err(PipelineError::InvalidQuery {
                reason: "query text is empty".to_string(),
            });
        }

        let query = if self.config.privacy.sanitize_queries {
            let sanitized = self.sanitizer.sanitize(&query.text);
            if sanitized.was_redacted() {
                debug!(redactions = ?sanitized.redactions, "Query sanitized");
            }
            query.with_sanitized(sanitized.text)
        } else {
            query
        };

        let assessment = self.screen(&query, scope).await?;

        let embedding = crate::timed_debug!(self.metrics, names::EMBEDDING, self.embedder.embed(&query.sanitized))?;
        let complexity = ComplexityEstimate::estimate(&query.sanitized);
        let query = Arc::new(query.with_embedding(embedding).with_complexity(complexity.score));

        let lookup_started = Instant::now();
        let lookup = match self.lookup(&query, scope).await {
            Ok(outcome) => outcome,
            Err(first) => {
                warn!(error = %first, "Cache lookup failed, retrying once");
                self.lookup(&query, scope).await?
            }
        };
        self.metrics.record_duration(names::CACHE_LOOKUP, lookup_started.elapsed());

        for corruption in lookup.corrupted {
            warn!(entry_id = %corruption.entry_id, reason = %corruption.reason, "Dropped corrupted cache entry");
            self.record(
                scope,
                AuditEvent::CacheCorruption {
                    entry_id: corruption.entry_id,
                    reason: corruption.reason,
                },
            );
        }

        match lookup.hit {
            Some(hit) => {
                self.metrics.increment(names::CACHE_HITS);
                self.serve_cached(&query, &assessment, hit, scope).await
            }
            None => {
                self.metrics.increment(names::CACHE_MISSES);
                self.serve_computed(query, &assessment, scope).await
            }
        }
    }

    async fn lookup(&self, query: &Query, scope: &QueryScope<'_>) -> Result<LookupOutcome> {
        let owner = scope.owner();
        within(
            Stage::CacheLookup,
            self.config.timeouts.cache_lookup(),
            self.cache.lookup(&query.embedding, Some(owner.as_str())),
        )
        .await
    }

    async fn screen(&self, query: &Query, scope: &QueryScope<'_>) -> Result<ThreatAssessment> {
        let started = Instant::now();
        let assessment = within(Stage::Screening, self.config.timeouts.screening(), async {
            self.screener.screen(query)
        })
        .await?;
        self.metrics.record_duration(names::SCREENING, started.elapsed());

        self.record(
            scope,
            AuditEvent::ThreatAssessed {
                decision: assessment.decision,
                severity: assessment.severity,
                signatures: assessment.signature_names(),
                anomaly_z: assessment.anomaly_z,
            },
        );

        if assessment.is_blocked() {
            self.metrics.increment(names::QUERIES_BLOCKED);
            warn!(
                severity = assessment.severity,
                signatures = ?assessment.signature_names(),
                "Query blocked"
            );
            return Err(PipelineError::SecurityBlocked {
                query_id: scope.id,
                severity: assessment.severity,
                reason: assessment.reason(),
            });
        }
        if assessment.is_monitored() {
            info!(severity = assessment.severity, "Query monitored");
        }
        Ok(assessment)
    }

    async fn serve_cached(
        &self,
        query: &Query,
        assessment: &ThreatAssessment,
        hit: CacheHit,
        scope: &QueryScope<'_>,
    ) -> Result<PipelineResponse> {
        debug!(entry_id = %hit.entry_id, similarity = hit.similarity, "Cache hit");

        // Entries protected earlier are served as stored, with no new charge
        let payload = match hit.privacy {
            Some(_) => hit.payload,
            None => {
                let (protected, marker) = self.protect(&hit.payload, scope).await?;
                if !self.cache.replace_payload(hit.entry_id, protected.clone(), marker).await {
                    debug!(entry_id = %hit.entry_id, "Cache entry evicted before protection was stored");
                }
                protected
            }
        };

        let raw = RawResult::direct(scope.id, payload, String::new()).with_path(ComputationPath::Cached);
        let complexity = ComplexityEstimate::estimate(&query.sanitized);
        let data = self.data_snapshot().await;
        let report = self.scorer.score(&raw, assessment, &complexity, &data);

        Ok(self.finish(raw.payload, report, assessment, true, None, Some(hit.similarity), scope))
    }

    async fn serve_computed(
        &self,
        query: Arc<Query>,
        assessment: &ThreatAssessment,
        scope: &QueryScope<'_>,
    ) -> Result<PipelineResponse> {
        let complexity = ComplexityEstimate::estimate(&query.sanitized);
        let raw = self.compute(Arc::clone(&query)).await?;
        let data = self.data_snapshot().await;
        let report = self.scorer.score(&raw, assessment, &complexity, &data);

        let (payload, marker) = self.protect(&raw.payload, scope).await?;
        self.store(&query, payload.clone(), marker, &report, assessment, scope).await;

        Ok(self.finish(payload, report, assessment, false, Some(raw.model_id), None, scope))
    }

    /// Batched inference, with one immediate single-item retry
    async fn compute(&self, query: Arc<Query>) -> Result<RawResult> {
        let batch_wait = self.config.timeouts.batch_wait(self.scheduler.config().max_wait());
        let inference_timeout = self.config.timeouts.inference();

        let started = Instant::now();
        let ticket = self.scheduler.submit(Arc::clone(&query));
        let first = ticket.wait(batch_wait, inference_timeout).await;
        self.metrics.record_duration(names::BATCH_WAIT, started.elapsed());

        let err = match first {
            Ok(raw) => return Ok(raw),
            Err(err) if err.is_retryable() => err,
            Err(err) => return Err(err.into()),
        };

        warn!(error = %err, "Batched inference failed, retrying as a single dispatch");
        match tokio::time::timeout(inference_timeout, self.scheduler.execute_single(query)).await {
            Ok(result) => result.map_err(PipelineError::from),
            Err(_) => Err(BatchError::InferenceTimeout {
                timeout_ms: inference_timeout.as_millis() as u64,
            }
            .into()),
        }
    }

    /// Noise the payload's metrics and audit the budget change
    async fn protect(
        &self,
        payload: &AnalyticsPayload,
        scope: &QueryScope<'_>,
    ) -> Result<(AnalyticsPayload, PrivacyMarker)> {
        let started = Instant::now();
        let outcome = within(Stage::Privacy, self.config.timeouts.privacy(), async {
            self.privacy.protect_payload(payload)
        })
        .await?;
        self.metrics.record_duration(names::PRIVACY, started.elapsed());

        match outcome {
            Ok((protected, marker)) => {
                if marker.epsilon_spent > 0.0 {
                    self.record(
                        scope,
                        AuditEvent::PrivacySpent {
                            epsilon: marker.epsilon_spent,
                            mechanism: marker.mechanism,
                            remaining_epsilon: self.privacy.snapshot().remaining_epsilon,
                            epoch: marker.epoch,
                        },
                    );
                }
                Ok((protected, marker))
            }
            Err(PrivacyError::BudgetExhausted { requested, remaining }) => {
                self.record(scope, AuditEvent::PrivacyRejected { requested, remaining });
                Err(PipelineError::PrivacyBudgetExhausted { requested, remaining })
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Cache a protected result. Monitored queries stay private to their caller.
    async fn store(
        &self,
        query: &Query,
        payload: AnalyticsPayload,
        marker: PrivacyMarker,
        report: &QualityReport,
        assessment: &ThreatAssessment,
        scope: &QueryScope<'_>,
    ) {
        let options = if assessment.is_monitored() {
            InsertOptions::monitored(scope.owner(), self.cache.config().monitored_ttl(), Some(marker))
        } else {
            InsertOptions::shared(Some(marker))
        };

        if let Err(e) = self
            .cache
            .insert(&query.sanitized, query.embedding.clone(), payload, report.quality, options)
            .await
        {
            warn!(error = %e, "Result not cached");
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        result: AnalyticsPayload,
        report: QualityReport,
        assessment: &ThreatAssessment,
        cache_hit: bool,
        model_id: Option<String>,
        similarity: Option<f32>,
        scope: &QueryScope<'_>,
    ) -> PipelineResponse {
        let review = self.gate.evaluate(&report);
        if let ReviewStatus::PendingReview {
            request_id,
            confidence,
            threshold,
            expires_at,
        } = &review
        {
            info!(confidence, threshold, "Result flagged for human review");
            self.record(
                scope,
                AuditEvent::ReviewRequired {
                    request_id: *request_id,
                    confidence: *confidence,
                    threshold: *threshold,
                    expires_at: *expires_at,
                },
            );
        }

        let sealed_confidence = if self.config.privacy.seal_confidence {
            Some(self.secure.seal(report.confidence as f64))
        } else {
            None
        };

        self.metrics.record_gauge(names::COMPOSITE_SCORE, report.composite as f64);
        self.record(
            scope,
            AuditEvent::QualityReported {
                report: report.clone(),
                cache_hit,
            },
        );

        PipelineResponse {
            query_id: scope.id,
            result,
            report,
            cache_hit,
            threat: ThreatAnnotation::from_assessment(assessment),
            review,
            model_id,
            similarity,
            sealed_confidence,
            duration_ms: 0,
        }
    }

    /// Tabular snapshot for data-quality scoring; an unreachable source scores as empty
    async fn data_snapshot(&self) -> DataSnapshot {
        match self.tabular.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Tabular snapshot unavailable");
                DataSnapshot::default()
            }
        }
    }

    fn record(&self, scope: &QueryScope<'_>, event: AuditEvent) {
        if let Err(e) = self.audit.record(Some(scope.id), scope.caller, event) {
            error!(query_id = %scope.id, error = %e, "Audit record lost");
        }
    }

    /// Pre-populate the cache with precomputed answers
    pub async fn prewarm(&self, seeds: Vec<CacheSeed>) -> Result<usize> {
        Ok(self.cache.warm(&self.embedder, seeds).await?)
    }

    /// Compute and cache the common MSP questions.
    ///
    /// Seeds are stored unprotected and charged to the budget when first served.
    /// Questions that fail to compute are skipped.
    pub async fn prewarm_common(&self) -> Result<usize> {
        let mut seeds = Vec::with_capacity(COMMON_QUERIES.len());
        let data = self.data_snapshot().await;

        for text in COMMON_QUERIES {
            let query = Query::new(*text, HashMap::new());
            let assessment = self.screener.screen(&query);
            if assessment.is_blocked() {
                continue;
            }
            let embedding = self.embedder.embed(&query.sanitized)?;
            let complexity = ComplexityEstimate::estimate(&query.sanitized);
            let query = Arc::new(query.with_embedding(embedding).with_complexity(complexity.score));
            match self.scheduler.execute_single(query).await {
                Ok(raw) => {
                    let report = self.scorer.score(&raw, &assessment, &complexity, &data);
                    seeds.push(CacheSeed::new(*text, raw.payload, report.quality));
                }
                Err(e) => warn!(query = *text, error = %e, "Skipping prewarm query"),
            }
        }

        self.prewarm(seeds).await
    }

    /// Operator action: start a new privacy epoch
    pub fn refresh_privacy_budget(&self, new_total: Option<f64>) -> Result<BudgetSnapshot> {
        let snapshot = self.privacy.refresh(new_total)?;
        let event = AuditEvent::PrivacyRefreshed {
            epoch: snapshot.epoch,
            total_epsilon: snapshot.total_epsilon,
        };
        if let Err(e) = self.audit.record(None, None, event) {
            error!(error = %e, "Audit record lost");
        }
        Ok(snapshot)
    }

    pub fn privacy_snapshot(&self) -> BudgetSnapshot {
        self.privacy.snapshot()
    }

    pub fn audit_stats(&self) -> AuditStats {
        self.audit.stats()
    }

    /// Wait until every queued audit record has been delivered or dropped
    pub async fn flush_audit(&self) -> Result<()> {
        Ok(self.audit.flush().await?)
    }

    /// Drain the audit queue and stop its worker
    pub async fn shutdown(self) -> AuditStats {
        self.audit.shutdown().await
    }

    /// Aggregate view of every stage with recommendations
    pub async fn performance_report(&self) -> PerformanceReport {
        let metrics = self.metrics.get_performance_summary();
        let cache = self.cache.stats().await;
        let privacy = self.privacy.snapshot();
        let batching = self.scheduler.stats();
        let load = self.load.snapshot(batching.pending + batching.in_flight);
        let largest_model = self
            .selector
            .select(&self.hardware.probe(), 1.0)
            .into_iter()
            .max_by_key(|m| m.memory_mb)
            .map(|m| (m.id, m.memory_mb));

        let inputs = PerformanceInputs {
            samples: metrics.query_latency_ms.count,
            avg_inference_ms: metrics.inference_ms.mean,
            avg_memory_mb: metrics.memory_usage_mb.mean,
            avg_composite: metrics.composite_score.mean,
            cache_hit_rate: metrics.cache_hit_rate(),
            cache_lookups: metrics.cache_hits + metrics.cache_misses,
            cache_entries: cache.entry_count,
            privacy_remaining_fraction: privacy.remaining_fraction(),
            privacy_low: privacy.is_low,
            memory_headroom: load.memory_headroom,
            largest_model,
        };
        let recommendations = self.recommender.recommend(&inputs);

        PerformanceReport {
            generated_at: Utc::now(),
            uptime_secs: self.metrics.uptime().as_secs(),
            metrics,
            cache,
            privacy,
            security: self.screener.security_summary(),
            batching,
            residency: self.residency.status(),
            models: self.selector.usage(),
            audit: self.audit.stats(),
            recommendations,
        }
    }
}

/// Bound a stage by its timeout
async fn within<T>(stage: Stage, limit: Duration, fut: impl Future<Output = T>) -> Result<T> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| PipelineError::Timeout {
            stage,
            timeout_ms: limit.as_millis() as u64,
        })
}

/// Stage an error is attributed to in audit records
fn stage_of(err: &PipelineError) -> Option<Stage> {
    match err {
        PipelineError::SecurityBlocked { .. } | PipelineError::Screening(_) => Some(Stage::Screening),
        PipelineError::Timeout { stage, .. } => Some(*stage),
        PipelineError::BatchTimeout { .. } => Some(Stage::BatchWait),
        PipelineError::PrivacyBudgetExhausted { .. } | PipelineError::Privacy(_) => Some(Stage::Privacy),
        PipelineError::ModelUnavailable { .. } | PipelineError::Inference(_) => Some(Stage::Inference),
        PipelineError::Cache(_) => Some(Stage::CacheLookup),
        _ => None,
    }
}
