//! Audit sinks

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

use super::error::{AuditError, AuditResult};
use super::events::AuditRecord;

/// Receiver of audit records (the governance collaborator).
///
/// The trail retries failed deliveries, so sinks may see a record more than once.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn deliver(&self, record: &AuditRecord) -> AuditResult<()>;
}

/// Keeps records in memory
#[derive(Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
    failures_remaining: AtomicUsize,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next `count` deliveries
    pub fn fail_next(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }

    pub fn records_for(&self, query_id: Uuid) -> Vec<AuditRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.query_id == Some(query_id))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn deliver(&self, record: &AuditRecord) -> AuditResult<()> {
        let injected = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(AuditError::DeliveryFailed {
                reason: "injected failure".to_string(),
            });
        }
        self.records.lock().push(record.clone());
        Ok(())
    }
}

/// Emits records as structured `tracing` events on the `audit` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn deliver(&self, record: &AuditRecord) -> AuditResult<()> {
        let payload = serde_json::to_string(&record.event).map_err(|e| AuditError::DeliveryFailed {
            reason: e.to_string(),
        })?;
        tracing::info!(
            target: "audit",
            record_id = %record.record_id,
            query_id = ?record.query_id,
            sequence = record.sequence,
            caller = record.caller_digest.as_deref().unwrap_or("-"),
            kind = record.event.kind(),
            event = %payload,
            "Audit record"
        );
        Ok(())
    }
}
