//! Ordered, at-least-once audit delivery
//!
//! Records are queued on an unbounded channel and delivered by a single
//! worker in submission order. Failed deliveries are retried with capped
//! exponential backoff up to `max_attempts`, after which the record is
//! dropped and logged. `flush` and `shutdown` wait at most `drain_timeout`.

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::config::AuditConfig;
use super::error::{AuditError, AuditResult};
use super::events::{AuditEvent, AuditRecord};
use super::sink::AuditSink;

enum AuditMessage {
    Record(AuditRecord),
    Flush(oneshot::Sender<()>),
}

#[derive(Default)]
struct Counters {
    delivered: AtomicU64,
    retries: AtomicU64,
    dropped: AtomicU64,
}

/// Delivery counters
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AuditStats {
    pub recorded: u64,
    pub delivered: u64,
    pub retries: u64,
    /// Records given up on after `max_attempts`
    pub dropped: u64,
    pub pending: u64,
    pub open_queries: usize,
}

/// Audit trail feeding one sink
pub struct AuditTrail {
    sender: mpsc::UnboundedSender<AuditMessage>,
    sequences: DashMap<Uuid, u64>,
    global_sequence: Mutex<u64>,
    recorded: AtomicU64,
    counters: Arc<Counters>,
    drain_timeout: Duration,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AuditTrail {
    /// Start the delivery worker. Must be called from within a tokio runtime.
    pub fn spawn(sink: Arc<dyn AuditSink>, config: AuditConfig) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let counters = Arc::new(Counters::default());
        let drain_timeout = config.drain_timeout();
        let worker = tokio::spawn(run_worker(receiver, sink, config, counters.clone()));

        Self {
            sender,
            sequences: DashMap::new(),
            global_sequence: Mutex::new(0),
            recorded: AtomicU64::new(0),
            counters,
            drain_timeout,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Queue a record. Sequence numbers are assigned and queued atomically per query.
    pub fn record(
        &self,
        query_id: Option<Uuid>,
        caller_digest: Option<&str>,
        event: AuditEvent,
    ) -> AuditResult<()> {
        let build = |sequence: u64, event: AuditEvent| AuditRecord {
            record_id: Uuid::now_v7(),
            query_id,
            sequence,
            caller_digest: caller_digest.map(str::to_string),
            timestamp: Utc::now(),
            event,
        };

        let sent = match query_id {
            Some(id) => {
                let mut seq = self.sequences.entry(id).or_insert(0);
                *seq += 1;
                self.sender.send(AuditMessage::Record(build(*seq, event)))
            }
            None => {
                let mut seq = self.global_sequence.lock();
                *seq += 1;
                self.sender.send(AuditMessage::Record(build(*seq, event)))
            }
        };

        sent.map_err(|_| AuditError::ChannelClosed)?;
        self.recorded.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Forget the sequence counter for a finished query
    pub fn finish_query(&self, query_id: Uuid) {
        self.sequences.remove(&query_id);
    }

    /// Wait until everything queued so far has been delivered or dropped
    pub async fn flush(&self) -> AuditResult<()> {
        let (ack, done) = oneshot::channel();
        self.sender
            .send(AuditMessage::Flush(ack))
            .map_err(|_| AuditError::ChannelClosed)?;
        match tokio::time::timeout(self.drain_timeout, done).await {
            Ok(acked) => acked.map_err(|_| AuditError::ChannelClosed),
            Err(_) => Err(AuditError::DrainTimeout {
                timeout_ms: self.drain_timeout.as_millis() as u64,
                pending: self.stats().pending,
            }),
        }
    }

    /// Close the queue and wait for the worker to deliver what remains.
    ///
    /// Records still queued when the drain timeout passes are abandoned and
    /// show up as `pending` in the returned stats.
    pub async fn shutdown(self) -> AuditStats {
        let AuditTrail {
            sender,
            worker,
            recorded,
            counters,
            drain_timeout,
            ..
        } = self;
        drop(sender);

        if let Some(mut handle) = worker.into_inner() {
            match tokio::time::timeout(drain_timeout, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "Audit worker ended abnormally"),
                Err(_) => handle.abort(),
            }
        }

        let stats = collect_stats(recorded.load(Ordering::Relaxed), &counters, 0);
        if stats.pending > 0 {
            error!(pending = stats.pending, "Audit trail shut down with undelivered records");
        }
        stats
    }

    pub fn stats(&self) -> AuditStats {
        collect_stats(self.recorded.load(Ordering::Relaxed), &self.counters, self.sequences.len())
    }
}

fn collect_stats(recorded: u64, counters: &Counters, open_queries: usize) -> AuditStats {
    let delivered = counters.delivered.load(Ordering::Relaxed);
    let dropped = counters.dropped.load(Ordering::Relaxed);
    AuditStats {
        recorded,
        delivered,
        retries: counters.retries.load(Ordering::Relaxed),
        dropped,
        pending: recorded.saturating_sub(delivered + dropped),
        open_queries,
    }
}

async fn run_worker(
    mut receiver: mpsc::UnboundedReceiver<AuditMessage>,
    sink: Arc<dyn AuditSink>,
    config: AuditConfig,
    counters: Arc<Counters>,
) {
    while let Some(message) = receiver.recv().await {
        match message {
            AuditMessage::Record(record) => {
                deliver(sink.as_ref(), &record, &config, &counters).await;
            }
            AuditMessage::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    debug!("Audit worker stopped");
}

async fn deliver(sink: &dyn AuditSink, record: &AuditRecord, config: &AuditConfig, counters: &Counters) {
    let mut delay = config.retry_initial();
    let max_delay = config.retry_max();
    let max_attempts = config.max_attempts();
    let mut attempt: u32 = 0;

    loop {
        match sink.deliver(record).await {
            Ok(()) => {
                counters.delivered.fetch_add(1, Ordering::Relaxed);
                return;
            }
            Err(e) => {
                attempt += 1;
                counters.retries.fetch_add(1, Ordering::Relaxed);
                if attempt >= max_attempts {
                    counters.dropped.fetch_add(1, Ordering::Relaxed);
                    error!(
                        record_id = %record.record_id,
                        query_id = ?record.query_id,
                        kind = record.event.kind(),
                        attempts = attempt,
                        error = %e,
                        "Audit record lost"
                    );
                    return;
                }
                warn!(
                    record_id = %record.record_id,
                    kind = record.event.kind(),
                    attempt,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %e,
                    "Audit delivery failed, retrying"
                );
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(max_delay);
            }
        }
    }
}
