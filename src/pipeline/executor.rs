//! Batch executor backed by the model selector and an inference backend
//!
//! Each dispatched job probes the hardware, walks the selector's ordered
//! candidates and runs the batch on the first model that can be leased and
//! answers in time.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, error, warn};

use crate::batching::BatchExecutor;
use crate::core::types::{ComputationPath, Query};
use crate::inference::{InferenceBackend, InferenceError, RawResult};
use crate::logging::{names, MetricsCollector};
use crate::selector::{HardwareProbe, ModelProfile, ModelSelector, ResidencyTracker};

pub struct PipelineExecutor {
    backend: Arc<dyn InferenceBackend>,
    selector: Arc<ModelSelector>,
    residency: ResidencyTracker,
    hardware: Arc<dyn HardwareProbe>,
    inference_timeout: Duration,
    metrics: Arc<MetricsCollector>,
}

impl PipelineExecutor {
    pub fn new(
        backend: Arc<dyn InferenceBackend>,
        selector: Arc<ModelSelector>,
        residency: ResidencyTracker,
        hardware: Arc<dyn HardwareProbe>,
        inference_timeout: Duration,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            backend,
            selector,
            residency,
            hardware,
            inference_timeout,
            metrics,
        }
    }

    /// Run the batch on one model. Outer errors mean the model as a whole failed.
    async fn run_on(
        &self,
        batch: &[Arc<Query>],
        model: &ModelProfile,
    ) -> Result<Vec<Result<RawResult, InferenceError>>, InferenceError> {
        let _lease = self
            .residency
            .acquire(model)
            .await
            .map_err(|e| InferenceError::ModelUnavailable {
                reason: e.to_string(),
            })?;

        let started = Instant::now();
        let outcome = tokio::time::timeout(self.inference_timeout, self.backend.compute(batch, model)).await;
        let elapsed = started.elapsed();

        let results = match outcome {
            Ok(Ok(results)) => results,
            Ok(Err(e)) => {
                self.selector.record_outcome(&model.id, elapsed, false);
                return Err(e);
            }
            Err(_) => {
                self.selector.record_outcome(&model.id, elapsed, false);
                return Err(InferenceError::Timeout {
                    timeout_ms: self.inference_timeout.as_millis() as u64,
                });
            }
        };

        self.selector.record_outcome(&model.id, elapsed, true);
        self.metrics.record_duration(names::INFERENCE, elapsed);
        self.metrics.record_gauge(names::BATCH_SIZE, batch.len() as f64);
        self.metrics
            .record_gauge(names::MEMORY_USAGE_MB, self.residency.status().used_mb as f64);

        let per_item_ms = elapsed.as_millis() as u64 / batch.len().max(1) as u64;
        Ok(results
            .into_iter()
            .map(|item| {
                item.map(|mut raw| {
                    if raw.model_id.is_empty() {
                        raw.model_id = model.id.clone();
                    }
                    if raw.latency_ms == 0 {
                        raw.latency_ms = per_item_ms;
                    }
                    ensure_direct(raw)
                })
            })
            .collect())
    }
}

#[async_trait]
impl BatchExecutor for PipelineExecutor {
    async fn execute(&self, batch: Vec<Arc<Query>>) -> Vec<Result<RawResult, InferenceError>> {
        let hardware = self.hardware.probe();
        let candidates = self.selector.select(&hardware, batch_complexity(&batch));
        let mut last_error = None;

        for model in &candidates {
            match self.run_on(&batch, model).await {
                Ok(mut results) => {
                    if results.len() != batch.len() {
                        warn!(
                            model = %model.id,
                            expected = batch.len(),
                            received = results.len(),
                            "Backend returned wrong number of results"
                        );
                        results.resize_with(batch.len(), || {
                            Err(InferenceError::ModelFailed {
                                model_id: model.id.clone(),
                                reason: "no result for batch slot".to_string(),
                            })
                        });
                    }
                    debug!(model = %model.id, size = batch.len(), "Batch computed");
                    return results;
                }
                Err(e) => {
                    warn!(model = %model.id, error = %e, "Model failed, trying next candidate");
                    last_error = Some(e);
                }
            }
        }

        let reason = match last_error {
            Some(e) => format!("all {} candidate models failed; last error: {e}", candidates.len()),
            None => "no candidate models for this hardware".to_string(),
        };
        error!(size = batch.len(), reason = %reason, "No model available");
        batch
            .iter()
            .map(|_| {
                Err(InferenceError::ModelUnavailable {
                    reason: reason.clone(),
                })
            })
            .collect()
    }
}

/// The hardest member decides; unestimated queries count as fully complex
fn batch_complexity(batch: &[Arc<Query>]) -> f32 {
    batch
        .iter()
        .map(|q| q.complexity.unwrap_or(1.0))
        .fold(0.0, f32::max)
}

/// Backends never serve from the cache; a `Cached` path is reset to `Direct`
fn ensure_direct(raw: RawResult) -> RawResult {
    match raw.path {
        ComputationPath::Cached => raw.with_path(ComputationPath::Direct),
        _ => raw,
    }
}
