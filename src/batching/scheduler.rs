//! Adaptive batch scheduler
//!
//! Queries join an open job sized by the predictor. A job dispatches when it
//! reaches its target size or when its max-wait timer fires, whichever comes
//! first. Each member receives its own result.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use super::config::BatchConfig;
use super::error::{BatchError, BatchResult};
use super::load::{LoadProbe, LoadSnapshot};
use super::predictor::SizePredictor;
use crate::core::types::Query;
use crate::inference::{InferenceError, RawResult};

const RECENT_SIZES: usize = 32;

/// Runs a dispatched job. Must return one result per query, in order.
#[async_trait]
pub trait BatchExecutor: Send + Sync {
    async fn execute(&self, batch: Vec<Arc<Query>>) -> Vec<Result<RawResult, InferenceError>>;
}

/// Why a job left the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchReason {
    /// Target size reached
    Full,
    /// Max-wait elapsed first
    Deadline,
}

type Reply = Result<RawResult, InferenceError>;

struct BatchMember {
    ticket_id: Uuid,
    query: Arc<Query>,
    dispatched: oneshot::Sender<()>,
    reply: oneshot::Sender<Reply>,
}

struct BatchJob {
    id: Uuid,
    target_size: usize,
    load: LoadSnapshot,
    members: Vec<BatchMember>,
}

/// Scheduler counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchStats {
    pub jobs_dispatched: u64,
    pub items_dispatched: u64,
    pub full_dispatches: u64,
    pub deadline_dispatches: u64,
    pub cancelled: u64,
    pub item_failures: u64,
    pub avg_batch_size: f64,
    pub recent_sizes: Vec<usize>,
    pub pending: usize,
    pub in_flight: usize,
    pub observations: usize,
    pub model_fitted: bool,
}

struct SchedulerInner {
    config: BatchConfig,
    executor: Arc<dyn BatchExecutor>,
    load_probe: Arc<dyn LoadProbe>,
    /// Lock order: `open` before `predictor`
    open: Mutex<Option<BatchJob>>,
    predictor: Mutex<SizePredictor>,
    in_flight: AtomicUsize,
    stats: Mutex<BatchStats>,
}

/// Groups concurrent queries into jobs sized by observed load
#[derive(Clone)]
pub struct AdaptiveBatchScheduler {
    inner: Arc<SchedulerInner>,
}

impl AdaptiveBatchScheduler {
    pub fn new(
        config: BatchConfig,
        executor: Arc<dyn BatchExecutor>,
        load_probe: Arc<dyn LoadProbe>,
    ) -> Self {
        let predictor = SizePredictor::new(&config);
        Self {
            inner: Arc::new(SchedulerInner {
                config,
                executor,
                load_probe,
                open: Mutex::new(None),
                predictor: Mutex::new(predictor),
                in_flight: AtomicUsize::new(0),
                stats: Mutex::new(BatchStats::default()),
            }),
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.inner.config
    }

    /// Enqueue a query. Must be called from within a tokio runtime.
    pub fn submit(&self, query: Arc<Query>) -> BatchTicket {
        let (dispatched_tx, dispatched_rx) = oneshot::channel();
        let (reply_tx, reply_rx) = oneshot::channel();
        let ticket_id = Uuid::now_v7();
        let query_id = query.id;

        let member = BatchMember {
            ticket_id,
            query,
            dispatched: dispatched_tx,
            reply: reply_tx,
        };

        let (job_id, full) = {
            let mut open = self.inner.open.lock();
            let job = open.get_or_insert_with(|| SchedulerInner::open_job(&self.inner));
            job.members.push(member);
            let job_id = job.id;
            let full = if job.members.len() >= job.target_size {
                open.take()
            } else {
                None
            };
            (job_id, full)
        };

        trace!(query_id = %query_id, job_id = %job_id, "Query joined batch");

        if let Some(job) = full {
            tokio::spawn(SchedulerInner::dispatch(
                self.inner.clone(),
                job,
                DispatchReason::Full,
            ));
        }

        BatchTicket {
            ticket_id,
            job_id,
            dispatched: Some(dispatched_rx),
            reply: reply_rx,
            scheduler: Arc::downgrade(&self.inner),
            settled: false,
        }
    }

    /// Run one query on its own, bypassing the open job.
    pub async fn execute_single(&self, query: Arc<Query>) -> BatchResult<RawResult> {
        self.inner.in_flight.fetch_add(1, Ordering::SeqCst);
        let results = self.inner.executor.execute(vec![query]).await;
        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);

        match results.into_iter().next() {
            Some(result) => result.map_err(BatchError::Inference),
            None => Err(BatchError::Dropped),
        }
    }

    /// Size the next job would target under current load
    pub fn predict_size(&self) -> usize {
        let load = self
            .inner
            .load_probe
            .snapshot(self.inner.in_flight.load(Ordering::SeqCst));
        self.inner.predictor.lock().predict(&load)
    }

    /// Add an externally measured observation
    pub fn record_observation(&self, load: LoadSnapshot, optimal_size: usize) {
        let size = optimal_size.clamp(1, self.inner.config.max_batch_size.max(1));
        self.inner.predictor.lock().record(load, size);
    }

    /// Force a refit of the size model
    pub fn refit(&self) -> bool {
        self.inner.predictor.lock().refit()
    }

    /// Queries waiting in the open job
    pub fn pending(&self) -> usize {
        self.inner
            .open
            .lock()
            .as_ref()
            .map(|job| job.members.len())
            .unwrap_or(0)
    }

    pub fn stats(&self) -> BatchStats {
        let pending = self.pending();
        let (observations, model_fitted) = {
            let predictor = self.inner.predictor.lock();
            (predictor.len(), predictor.is_fitted())
        };
        let mut stats = self.inner.stats.lock().clone();
        stats.pending = pending;
        stats.in_flight = self.inner.in_flight.load(Ordering::SeqCst);
        stats.observations = observations;
        stats.model_fitted = model_fitted;
        stats
    }
}

impl SchedulerInner {
    /// Called with the `open` lock held.
    fn open_job(inner: &Arc<SchedulerInner>) -> BatchJob {
        let load = inner
            .load_probe
            .snapshot(inner.in_flight.load(Ordering::SeqCst));
        let target_size = inner.predictor.lock().predict(&load);
        let job_id = Uuid::now_v7();

        if target_size > 1 {
            let weak = Arc::downgrade(inner);
            let max_wait = inner.config.max_wait();
            tokio::spawn(async move {
                tokio::time::sleep(max_wait).await;
                if let Some(inner) = weak.upgrade() {
                    let expired = {
                        let mut open = inner.open.lock();
                        if open.as_ref().map(|job| job.id == job_id).unwrap_or(false) {
                            open.take()
                        } else {
                            None
                        }
                    };
                    if let Some(job) = expired {
                        SchedulerInner::dispatch(inner, job, DispatchReason::Deadline).await;
                    }
                }
            });
        }

        debug!(job_id = %job_id, target_size, "Opened batch job");

        BatchJob {
            id: job_id,
            target_size,
            load,
            members: Vec::with_capacity(target_size),
        }
    }

    async fn dispatch(inner: Arc<SchedulerInner>, job: BatchJob, reason: DispatchReason) {
        let BatchJob {
            id,
            target_size,
            load,
            members,
        } = job;
        let size = members.len();
        if size == 0 {
            return;
        }

        inner.in_flight.fetch_add(size, Ordering::SeqCst);

        let mut queries = Vec::with_capacity(size);
        let mut replies = Vec::with_capacity(size);
        for member in members {
            // Receiver gone means the ticket was dropped; the slot still runs
            let _ = member.dispatched.send(());
            queries.push(member.query);
            replies.push((member.ticket_id, member.reply));
        }

        info!(job_id = %id, size, target_size, reason = ?reason, "Dispatching batch");

        let started = Instant::now();
        let mut results = inner.executor.execute(queries).await;
        let elapsed = started.elapsed();

        if results.len() != size {
            warn!(
                job_id = %id,
                expected = size,
                received = results.len(),
                "Executor returned wrong number of results"
            );
            results.resize_with(size, || {
                Err(InferenceError::Internal {
                    reason: "no result for batch slot".to_string(),
                })
            });
        }

        let failures = results.iter().filter(|r| r.is_err()).count();
        for ((ticket_id, reply), result) in replies.into_iter().zip(results) {
            if reply.send(result).is_err() {
                trace!(ticket_id = %ticket_id, "Result discarded, ticket gone");
            }
        }

        inner.in_flight.fetch_sub(size, Ordering::SeqCst);

        let per_item_ms = elapsed.as_secs_f64() * 1000.0 / size as f64;
        {
            let mut stats = inner.stats.lock();
            stats.jobs_dispatched += 1;
            stats.items_dispatched += size as u64;
            stats.item_failures += failures as u64;
            match reason {
                DispatchReason::Full => stats.full_dispatches += 1,
                DispatchReason::Deadline => stats.deadline_dispatches += 1,
            }
            stats.avg_batch_size = stats.items_dispatched as f64 / stats.jobs_dispatched as f64;
            if stats.recent_sizes.len() == RECENT_SIZES {
                stats.recent_sizes.remove(0);
            }
            stats.recent_sizes.push(size);
        }

        if inner.config.adaptive_feedback {
            let optimal = observed_optimal(size, reason, per_item_ms, &inner.config);
            inner.predictor.lock().record(load, optimal);
        }

        debug!(
            job_id = %id,
            size,
            failures,
            elapsed_ms = elapsed.as_millis() as u64,
            "Batch complete"
        );
    }

    fn remove_member(&self, job_id: Uuid, ticket_id: Uuid) -> bool {
        let mut open = self.open.lock();
        let removed = match open.as_mut() {
            Some(job) if job.id == job_id => {
                let before = job.members.len();
                job.members.retain(|m| m.ticket_id != ticket_id);
                job.members.len() < before
            }
            _ => false,
        };
        if removed {
            if open.as_ref().map(|job| job.members.is_empty()).unwrap_or(false) {
                *open = None;
            }
            drop(open);
            self.stats.lock().cancelled += 1;
        }
        removed
    }
}

/// Optimal size implied by one dispatch.
///
/// A full job that stayed under the latency target could have been larger; a
/// slow job should have been smaller; a deadline dispatch was demand-limited.
pub fn observed_optimal(
    size: usize,
    reason: DispatchReason,
    per_item_ms: f64,
    config: &BatchConfig,
) -> usize {
    let target = config.target_item_latency_ms as f64;
    let max = config.max_batch_size.max(1);
    let optimal = if per_item_ms > target * 1.5 {
        size.saturating_sub(1)
    } else if reason == DispatchReason::Full && per_item_ms <= target {
        size + 1
    } else {
        size
    };
    optimal.clamp(1, max)
}

/// Handle for one submitted query
pub struct BatchTicket {
    ticket_id: Uuid,
    job_id: Uuid,
    dispatched: Option<oneshot::Receiver<()>>,
    reply: oneshot::Receiver<Reply>,
    scheduler: Weak<SchedulerInner>,
    settled: bool,
}

impl BatchTicket {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Wait for dispatch (bounded by `batch_wait`), then for the result
    /// (bounded by `inference_timeout`).
    pub async fn wait(
        mut self,
        batch_wait: Duration,
        inference_timeout: Duration,
    ) -> BatchResult<RawResult> {
        let started = Instant::now();

        if let Some(dispatched) = self.dispatched.take() {
            match tokio::time::timeout(batch_wait, dispatched).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => {
                    self.settled = true;
                    return Err(BatchError::Dropped);
                }
                // Withdrawal fails once the job has left; its result is still coming
                Err(_) if self.withdraw() => {
                    self.settled = true;
                    return Err(BatchError::WaitTimeout {
                        waited_ms: started.elapsed().as_millis() as u64,
                    });
                }
                Err(_) => {
                    trace!(job_id = %self.job_id, "Batch wait elapsed after dispatch, awaiting result");
                }
            }
        }
        self.settled = true;

        match tokio::time::timeout(inference_timeout, &mut self.reply).await {
            Ok(Ok(result)) => result.map_err(BatchError::Inference),
            Ok(Err(_)) => Err(BatchError::Dropped),
            Err(_) => Err(BatchError::InferenceTimeout {
                timeout_ms: inference_timeout.as_millis() as u64,
            }),
        }
    }

    /// Withdraw before dispatch. Returns `false` if the job already left.
    pub fn cancel(mut self) -> bool {
        let removed = self.withdraw();
        self.settled = true;
        removed
    }

    fn withdraw(&self) -> bool {
        self.scheduler
            .upgrade()
            .map(|inner| inner.remove_member(self.job_id, self.ticket_id))
            .unwrap_or(false)
    }
}

impl Drop for BatchTicket {
    fn drop(&mut self) {
        if !self.settled {
            self.withdraw();
        }
    }
}
