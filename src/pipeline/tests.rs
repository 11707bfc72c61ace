//! Tests for the query pipeline

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use super::*;
use crate::audit::{AuditEvent, MemoryAuditSink, ReviewStatus};
use crate::batching::StaticLoadProbe;
use crate::core::config::PipelineConfig;
use crate::core::error::{PipelineError, Stage};
use crate::core::types::{AnalyticsPayload, Query, CALLER_ID_KEY};
use crate::inference::{
    DataSnapshot, InferenceBackend, InferenceError, InferenceResult, RawResult, StaticTabularSource,
};
use crate::privacy::{PassthroughSecureComputation, SecureComputation};
use crate::quality::RecommendationKind;
use crate::selector::{HardwareProfile, ModelProfile, StaticHardwareProbe};

/// Backend answering every query with the same two metrics
#[derive(Default)]
struct AnalyticsBackend {
    calls: AtomicUsize,
    /// Per-item failures to return before succeeding
    transient_failures: AtomicUsize,
    model_confidence: Option<f32>,
    unavailable: bool,
}

impl AnalyticsBackend {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceBackend for AnalyticsBackend {
    async fn compute(
        &self,
        queries: &[Arc<Query>],
        model: &ModelProfile,
    ) -> InferenceResult<Vec<InferenceResult<RawResult>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(InferenceError::ModelFailed {
                model_id: model.id.clone(),
                reason: "weights missing".to_string(),
            });
        }

        Ok(queries
            .iter()
            .map(|query| {
                let fail = self
                    .transient_failures
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok();
                if fail {
                    return Err(InferenceError::ComputationFailed {
                        reason: "worker restarted".to_string(),
                    });
                }
                let payload = AnalyticsPayload::new(format!("Answer: {}", query.sanitized))
                    .with_metric("profit_margin", 0.24)
                    .with_metric("revenue", 120_000.0)
                    .with_data_source("invoices");
                let raw = RawResult::direct(query.id, payload, model.id.clone());
                Ok(match self.model_confidence {
                    Some(confidence) => raw.with_model_confidence(confidence),
                    None => raw,
                })
            })
            .collect())
    }
}

struct Harness {
    pipeline: QueryPipeline,
    backend: Arc<AnalyticsBackend>,
    sink: Arc<MemoryAuditSink>,
}

fn full_snapshot() -> DataSnapshot {
    DataSnapshot::new(12, 48, 300, 40).with_invoice_total(120_000.0)
}

fn harness_with(config: PipelineConfig, backend: AnalyticsBackend) -> Harness {
    let backend = Arc::new(backend);
    let sink = Arc::new(MemoryAuditSink::new());
    let pipeline = QueryPipeline::builder(config, backend.clone())
        .with_audit_sink(sink.clone())
        .with_tabular(Arc::new(StaticTabularSource::new(full_snapshot())))
        .with_hardware_probe(Arc::new(StaticHardwareProbe(HardwareProfile {
            total_memory_mb: 4_096,
            available_memory_mb: 3_000,
            cpu_cores: 2,
            has_gpu: false,
        })))
        .with_load_probe(Arc::new(StaticLoadProbe::new(0.2, 0.8)))
        .with_privacy_seed(7)
        .build()
        .unwrap();
    Harness {
        pipeline,
        backend,
        sink,
    }
}

fn harness() -> Harness {
    harness_with(PipelineConfig::default(), AnalyticsBackend::default())
}

fn no_context() -> HashMap<String, String> {
    HashMap::new()
}

fn caller(id: &str) -> HashMap<String, String> {
    HashMap::from([(CALLER_ID_KEY.to_string(), id.to_string())])
}

#[cfg(test)]
mod flow_tests {
    use super::*;

    #[tokio::test]
    async fn test_repeated_question_is_served_from_cache() {
        let h = harness();

        let first = h
            .pipeline
            .submit_query("What is our profit margin?", no_context())
            .await
            .unwrap();
        assert!(!first.cache_hit);
        assert_eq!(first.threat, ThreatAnnotation::Clear);
        assert!(first.model_id.is_some());

        let second = h
            .pipeline
            .submit_query("What is our profit margin?", no_context())
            .await
            .unwrap();
        assert!(second.cache_hit);
        assert_eq!(second.result, first.result);
        assert!(second.similarity.unwrap() > 0.99);
        assert_eq!(h.backend.calls(), 1);

        let stats = h.pipeline.cache().stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.entry_count, 1);
    }

    #[tokio::test]
    async fn test_cache_hit_does_not_charge_budget_again() {
        let h = harness();
        h.pipeline
            .submit_query("What is our profit margin?", no_context())
            .await
            .unwrap();
        let after_first = h.pipeline.privacy_snapshot().consumed_epsilon;
        assert!(after_first > 0.0);

        h.pipeline
            .submit_query("What is our profit margin?", no_context())
            .await
            .unwrap();
        assert_eq!(h.pipeline.privacy_snapshot().consumed_epsilon, after_first);
    }

    #[tokio::test]
    async fn test_released_metrics_are_noised() {
        let h = harness();
        let response = h
            .pipeline
            .submit_query("What is our profit margin?", no_context())
            .await
            .unwrap();
        assert_eq!(response.result.metrics.len(), 2);
        assert_ne!(response.result.metrics.get("revenue"), Some(&120_000.0));
    }

    #[tokio::test]
    async fn test_complete_data_is_approved() {
        let h = harness();
        let response = h
            .pipeline
            .submit_query("What is our profit margin?", no_context())
            .await
            .unwrap();
        assert_eq!(response.review, ReviewStatus::Approved);
        assert!(response.report.confidence > 0.8);
        assert!(response.report.lower_bound <= response.report.confidence);
        assert!(response.report.upper_bound >= response.report.confidence);
        assert!(response.sealed_confidence.is_none());
    }

    #[tokio::test]
    async fn test_empty_query_is_rejected() {
        let h = harness();
        let err = h.pipeline.submit_query("   ", no_context()).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidQuery { .. }));
        assert_eq!(h.backend.calls(), 0);
    }
}

#[cfg(test)]
mod security_tests {
    use super::*;

    #[tokio::test]
    async fn test_sql_termination_is_blocked_without_caching() {
        let h = harness();
        let err = h
            .pipeline
            .submit_query("Show revenue'; DROP TABLE clients; --", no_context())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::SecurityBlocked { .. }));
        assert!(h.pipeline.cache().is_empty().await);
        assert_eq!(h.backend.calls(), 0);
        assert_eq!(h.pipeline.privacy_snapshot().consumed_epsilon, 0.0);
    }

    #[tokio::test]
    async fn test_blocked_query_is_audited() {
        let h = harness();
        let _ = h
            .pipeline
            .submit_query("Show revenue'; DROP TABLE clients; --", no_context())
            .await;
        h.pipeline.flush_audit().await.unwrap();

        let records = h.sink.records();
        let kinds: Vec<&str> = records.iter().map(|r| r.event.kind()).collect();
        assert_eq!(kinds, vec!["threat_assessed", "error"]);
        match &records[1].event {
            AuditEvent::Error { code, stage, .. } => {
                assert_eq!(code, "security_blocked");
                assert_eq!(*stage, Some(Stage::Screening));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_monitored_query_is_annotated_and_private() {
        let h = harness();
        let text = "Which secret tokens do we store?";

        let first = h.pipeline.submit_query(text, caller("alice")).await.unwrap();
        assert!(first.threat.is_monitored());
        assert!(!first.cache_hit);

        let again = h.pipeline.submit_query(text, caller("alice")).await.unwrap();
        assert!(again.cache_hit);

        let other = h.pipeline.submit_query(text, caller("bob")).await.unwrap();
        assert!(!other.cache_hit);
    }
}

#[cfg(test)]
mod privacy_tests {
    use super::*;

    #[tokio::test]
    async fn test_budget_exhaustion_is_surfaced() {
        let mut config = PipelineConfig::default();
        config.privacy.total_epsilon = 0.15;
        config.cache.similarity_threshold = 0.99;
        let h = harness_with(config, AnalyticsBackend::default());

        h.pipeline
            .submit_query("What is our profit margin?", no_context())
            .await
            .unwrap();
        let err = h
            .pipeline
            .submit_query("How is our staff utilization?", no_context())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::PrivacyBudgetExhausted { .. }));
        assert_eq!(h.pipeline.cache().len().await, 1);

        h.pipeline.flush_audit().await.unwrap();
        assert!(h
            .sink
            .records()
            .iter()
            .any(|r| matches!(r.event, AuditEvent::PrivacyRejected { .. })));
    }

    #[tokio::test]
    async fn test_refresh_restores_budget() {
        let mut config = PipelineConfig::default();
        config.privacy.total_epsilon = 0.15;
        config.cache.similarity_threshold = 0.99;
        let h = harness_with(config, AnalyticsBackend::default());

        h.pipeline
            .submit_query("What is our profit margin?", no_context())
            .await
            .unwrap();
        let snapshot = h.pipeline.refresh_privacy_budget(None).unwrap();
        assert_eq!(snapshot.epoch, 1);
        assert_eq!(snapshot.consumed_epsilon, 0.0);

        h.pipeline
            .submit_query("How is our staff utilization?", no_context())
            .await
            .unwrap();

        h.pipeline.flush_audit().await.unwrap();
        assert!(h
            .sink
            .records()
            .iter()
            .any(|r| r.query_id.is_none() && matches!(r.event, AuditEvent::PrivacyRefreshed { epoch: 1, .. })));
    }

    #[tokio::test]
    async fn test_sealed_confidence_opens_to_reported_value() {
        let mut config = PipelineConfig::default();
        config.privacy.seal_confidence = true;
        let h = harness_with(config, AnalyticsBackend::default());

        let response = h
            .pipeline
            .submit_query("What is our profit margin?", no_context())
            .await
            .unwrap();
        let sealed = response.sealed_confidence.unwrap();
        let opened = PassthroughSecureComputation.open(&sealed).unwrap();
        assert!((opened - response.report.confidence as f64).abs() < 1e-6);
    }
}

#[cfg(test)]
mod inference_tests {
    use super::*;

    #[tokio::test]
    async fn test_transient_failure_is_retried_once() {
        let backend = AnalyticsBackend {
            transient_failures: AtomicUsize::new(1),
            ..Default::default()
        };
        let h = harness_with(PipelineConfig::default(), backend);

        let response = h
            .pipeline
            .submit_query("What is our profit margin?", no_context())
            .await
            .unwrap();
        assert!(!response.cache_hit);
        assert_eq!(h.backend.calls(), 2);
    }

    #[tokio::test]
    async fn test_no_model_available() {
        let backend = AnalyticsBackend {
            unavailable: true,
            ..Default::default()
        };
        let h = harness_with(PipelineConfig::default(), backend);

        let err = h
            .pipeline
            .submit_query("What is our profit margin?", no_context())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ModelUnavailable { .. }));
        assert!(h.pipeline.cache().is_empty().await);

        h.pipeline.flush_audit().await.unwrap();
        assert!(h.sink.records().iter().any(|r| matches!(
            &r.event,
            AuditEvent::Error { code, stage: Some(Stage::Inference), .. } if code == "model_unavailable"
        )));
    }

    #[tokio::test]
    async fn test_low_model_confidence_requires_review() {
        let backend = AnalyticsBackend {
            model_confidence: Some(0.4),
            ..Default::default()
        };
        let h = harness_with(PipelineConfig::default(), backend);

        let response = h
            .pipeline
            .submit_query("What is our profit margin?", no_context())
            .await
            .unwrap();
        assert!(response.review.is_pending());
        assert!(!response.result.answer.is_empty());

        h.pipeline.flush_audit().await.unwrap();
        assert!(h
            .sink
            .records_for(response.query_id)
            .iter()
            .any(|r| matches!(r.event, AuditEvent::ReviewRequired { .. })));
    }
}

#[cfg(test)]
mod audit_tests {
    use super::*;

    #[tokio::test]
    async fn test_query_records_are_ordered() {
        let h = harness();
        let response = h
            .pipeline
            .submit_query("What is our profit margin?", no_context())
            .await
            .unwrap();
        h.pipeline.flush_audit().await.unwrap();

        let records = h.sink.records_for(response.query_id);
        let kinds: Vec<&str> = records.iter().map(|r| r.event.kind()).collect();
        assert_eq!(kinds, vec!["threat_assessed", "privacy_spent", "quality_reported"]);
        let sequences: Vec<u64> = records.iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_caller_is_pseudonymized() {
        let h = harness();
        let response = h
            .pipeline
            .submit_query("What is our profit margin?", caller("alice@example.com"))
            .await
            .unwrap();
        h.pipeline.flush_audit().await.unwrap();

        let records = h.sink.records_for(response.query_id);
        let digest = records[0].caller_digest.clone().unwrap();
        assert!(!digest.contains("alice"));
        assert!(records.iter().all(|r| r.caller_digest.as_deref() == Some(digest.as_str())));
    }
}

#[cfg(test)]
mod operations_tests {
    use super::*;
    use crate::cache::COMMON_QUERIES;

    #[tokio::test]
    async fn test_prewarm_common_queries() {
        let h = harness();
        let warmed = h.pipeline.prewarm_common().await.unwrap();
        assert_eq!(warmed, COMMON_QUERIES.len());
        assert_eq!(h.pipeline.cache().len().await, COMMON_QUERIES.len());
        assert_eq!(h.pipeline.privacy_snapshot().consumed_epsilon, 0.0);

        let first = h
            .pipeline
            .submit_query("What is our profit margin?", no_context())
            .await
            .unwrap();
        assert!(first.cache_hit);
        let charged = h.pipeline.privacy_snapshot().consumed_epsilon;
        assert!(charged > 0.0);

        let second = h
            .pipeline
            .submit_query("What is our profit margin?", no_context())
            .await
            .unwrap();
        assert_eq!(second.result, first.result);
        assert_eq!(h.pipeline.privacy_snapshot().consumed_epsilon, charged);
    }

    #[tokio::test]
    async fn test_performance_report() {
        let h = harness();
        h.pipeline
            .submit_query("What is our profit margin?", no_context())
            .await
            .unwrap();
        h.pipeline
            .submit_query("What is our profit margin?", no_context())
            .await
            .unwrap();
        let _ = h
            .pipeline
            .submit_query("x' UNION SELECT * FROM users", no_context())
            .await;

        let report = h.pipeline.performance_report().await;
        assert_eq!(report.metrics.cache_hits, 1);
        assert_eq!(report.metrics.cache_misses, 1);
        assert_eq!(report.metrics.queries_blocked, 1);
        assert_eq!(report.security.total_screened, 3);
        assert_eq!(report.batching.items_dispatched, 1);
        assert!(report.privacy.consumed_epsilon > 0.0);
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.kind == RecommendationKind::CachePrewarm));
    }

    #[tokio::test]
    async fn test_shutdown_drains_audit() {
        let h = harness();
        h.pipeline
            .submit_query("What is our profit margin?", no_context())
            .await
            .unwrap();
        let sink = h.sink.clone();
        h.pipeline.shutdown().await;
        assert_eq!(sink.len(), 3);
    }
}

#[cfg(test)]
mod executor_tests {
    use super::*;
    use crate::batching::BatchExecutor;
    use crate::logging::MetricsCollector;
    use crate::selector::{ModelSelector, ResidencyTracker, SelectorConfig};
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    /// Backend where one model can be taken down
    struct FlakyModelBackend {
        failing_model: &'static str,
        down: AtomicBool,
        attempts: Mutex<Vec<String>>,
    }

    impl FlakyModelBackend {
        fn new(failing_model: &'static str) -> Self {
            Self {
                failing_model,
                down: AtomicBool::new(true),
                attempts: Mutex::new(Vec::new()),
            }
        }

        fn attempts_on(&self, model_id: &str) -> usize {
            self.attempts.lock().iter().filter(|id| *id == model_id).count()
        }
    }

    #[async_trait]
    impl InferenceBackend for FlakyModelBackend {
        async fn compute(
            &self,
            queries: &[Arc<Query>],
            model: &ModelProfile,
        ) -> InferenceResult<Vec<InferenceResult<RawResult>>> {
            self.attempts.lock().push(model.id.clone());
            if model.id == self.failing_model && self.down.load(Ordering::SeqCst) {
                return Err(InferenceError::ModelFailed {
                    model_id: model.id.clone(),
                    reason: "out of memory".to_string(),
                });
            }
            Ok(queries
                .iter()
                .map(|q| Ok(RawResult::direct(q.id, AnalyticsPayload::new("ok"), model.id.clone())))
                .collect())
        }
    }

    fn executor(
        backend: Arc<FlakyModelBackend>,
        selector: Arc<ModelSelector>,
        hardware: HardwareProfile,
    ) -> PipelineExecutor {
        PipelineExecutor::new(
            backend,
            selector,
            ResidencyTracker::new(8_192),
            Arc::new(StaticHardwareProbe(hardware)),
            Duration::from_secs(1),
            Arc::new(MetricsCollector::new()),
        )
    }

    fn medium_host() -> HardwareProfile {
        HardwareProfile {
            total_memory_mb: 16_384,
            available_memory_mb: 12_000,
            cpu_cores: 8,
            has_gpu: false,
        }
    }

    fn high_host() -> HardwareProfile {
        HardwareProfile {
            total_memory_mb: 32_768,
            available_memory_mb: 30_000,
            cpu_cores: 16,
            has_gpu: true,
        }
    }

    fn batch_of(complexity: f32) -> Vec<Arc<Query>> {
        vec![Arc::new(
            Query::new("What is our profit margin?", no_context()).with_complexity(complexity),
        )]
    }

    fn answered_by(results: &[Result<RawResult, InferenceError>]) -> &str {
        results[0].as_ref().unwrap().model_id.as_str()
    }

    #[tokio::test]
    async fn test_failed_model_recovers_after_cooldown() {
        let backend = Arc::new(FlakyModelBackend::new("phi3:mini"));
        let selector = Arc::new(ModelSelector::new(SelectorConfig {
            unreliable_cooldown_ms: 40,
            ..Default::default()
        }));
        let exec = executor(backend.clone(), selector.clone(), medium_host());

        for _ in 0..3 {
            let results = exec.execute(batch_of(0.5)).await;
            assert_eq!(answered_by(&results), "tinyllama");
        }
        assert_eq!(backend.attempts_on("phi3:mini"), 3);

        // cooling down: the failed model is not attempted
        let results = exec.execute(batch_of(0.5)).await;
        assert_eq!(answered_by(&results), "tinyllama");
        assert_eq!(backend.attempts_on("phi3:mini"), 3);

        backend.down.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(60)).await;

        let results = exec.execute(batch_of(0.5)).await;
        assert_eq!(answered_by(&results), "phi3:mini");
        let usage = selector.usage();
        let phi3 = usage.iter().find(|u| u.model_id == "phi3:mini").unwrap();
        assert!(phi3.reliable);
    }

    #[tokio::test]
    async fn test_batch_complexity_orders_candidates() {
        let backend = Arc::new(FlakyModelBackend::new("none"));
        let selector = Arc::new(ModelSelector::new(SelectorConfig::default()));
        let exec = executor(backend, selector, high_host());

        let simple = exec.execute(batch_of(0.1)).await;
        assert_eq!(answered_by(&simple), "phi3:mini");

        let complex = exec.execute(batch_of(0.9)).await;
        assert_eq!(answered_by(&complex), "llama3:8b");

        let mut mixed = batch_of(0.1);
        mixed.extend(batch_of(0.9));
        let results = exec.execute(mixed).await;
        assert_eq!(answered_by(&results), "llama3:8b");
    }
}
