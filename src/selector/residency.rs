//! Model residency tracking
//!
//! Implements:
//! - Reference-counted leases on resident models
//! - LRU eviction of idle models under a memory budget
//! - At most one High-tier model resident at a time

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::catalog::{ModelProfile, ModelTier};

/// Errors raised while acquiring a model
#[derive(Error, Debug)]
pub enum ResidencyError {
    #[error("Insufficient memory for {model_id}: need {needed_mb} MB, {available_mb} MB free")]
    InsufficientMemory {
        model_id: String,
        needed_mb: u64,
        available_mb: u64,
    },
    
    #[error("Residency tracker closed")]
    Closed,
}

/// Information about a resident model
#[derive(Debug, Clone)]
struct Residency {
    tier: ModelTier,
    memory_mb: u64,
    leases: usize,
    last_used: Instant,
    use_count: u64,
}

/// Current residency status
#[derive(Debug, Clone, Serialize)]
pub struct ResidencyStatus {
    pub used_mb: u64,
    pub budget_mb: u64,
    pub resident: Vec<String>,
    pub active_leases: usize,
}

struct Inner {
    budget_mb: u64,
    large_slot: Arc<Semaphore>,
    resident: Mutex<HashMap<String, Residency>>,
}

/// Tracks which models are resident and who is using them
#[derive(Clone)]
pub struct ResidencyTracker {
    inner: Arc<Inner>,
}

/// Keeps a model resident while held
pub struct ModelLease {
    model_id: String,
    inner: Arc<Inner>,
    _large_slot: Option<OwnedSemaphorePermit>,
}

impl ModelLease {
    pub fn model_id(&self) -> &str {
        &self.model_id
    }
}

impl Drop for ModelLease {
    fn drop(&mut self) {
        let mut resident = self.inner.resident.lock();
        if let Some(r) = resident.get_mut(&self.model_id) {
            r.leases = r.leases.saturating_sub(1);
            r.last_used = Instant::now();
        }
    }
}

impl ResidencyTracker {
    pub fn new(budget_mb: u64) -> Self {
        Self {
            inner: Arc::new(Inner {
                budget_mb,
                large_slot: Arc::new(Semaphore::new(1)),
                resident: Mutex::new(HashMap::new()),
            }),
        }
    }
    
    /// Lease a model, loading (registering) it if needed.
    ///
    /// High-tier leases wait for the single large-model slot.
    pub async fn acquire(&self, profile: &ModelProfile) -> Result<ModelLease, ResidencyError> {
        let permit = if profile.tier == ModelTier::High {
            Some(
                self.inner
                    .large_slot
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|_| ResidencyError::Closed)?,
            )
        } else {
            None
        };
        
        let mut resident = self.inner.resident.lock();
        let now = Instant::now();
        
        if let Some(r) = resident.get_mut(&profile.id) {
            r.leases += 1;
            r.last_used = now;
            r.use_count += 1;
        } else {
            if profile.tier == ModelTier::High {
                let other_large: Vec<String> = resident
                    .iter()
                    .filter(|(_, r)| r.tier == ModelTier::High && r.leases == 0)
                    .map(|(id, _)| id.clone())
                    .collect();
                for id in other_large {
                    resident.remove(&id);
                    tracing::debug!(model = %id, "Unloaded large model to free the slot");
                }
            }
            
            let used: u64 = resident.values().map(|r| r.memory_mb).sum();
            if used + profile.memory_mb > self.inner.budget_mb {
                Self::evict_idle(&mut resident, profile.memory_mb, self.inner.budget_mb);
            }
            
            let used: u64 = resident.values().map(|r| r.memory_mb).sum();
            if used + profile.memory_mb > self.inner.budget_mb {
                return Err(ResidencyError::InsufficientMemory {
                    model_id: profile.id.clone(),
                    needed_mb: profile.memory_mb,
                    available_mb: self.inner.budget_mb.saturating_sub(used),
                });
            }
            
            resident.insert(
                profile.id.clone(),
                Residency {
                    tier: profile.tier,
                    memory_mb: profile.memory_mb,
                    leases: 1,
                    last_used: now,
                    use_count: 1,
                },
            );
            tracing::debug!(
                model = %profile.id,
                used_mb = used + profile.memory_mb,
                budget_mb = self.inner.budget_mb,
                "Model resident"
            );
        }
        
        Ok(ModelLease {
            model_id: profile.id.clone(),
            inner: self.inner.clone(),
            _large_slot: permit,
        })
    }
    
    /// Evict idle models, least recently used first, until `needed_mb` fits
    fn evict_idle(resident: &mut HashMap<String, Residency>, needed_mb: u64, budget_mb: u64) {
        let mut idle: Vec<(String, Instant)> = resident
            .iter()
            .filter(|(_, r)| r.leases == 0)
            .map(|(id, r)| (id.clone(), r.last_used))
            .collect();
        idle.sort_by_key(|(_, last_used)| *last_used);
        
        for (id, _) in idle {
            let used: u64 = resident.values().map(|r| r.memory_mb).sum();
            if used + needed_mb <= budget_mb {
                break;
            }
            resident.remove(&id);
            tracing::info!(model = %id, "Evicted idle model");
        }
    }
    
    pub fn status(&self) -> ResidencyStatus {
        let resident = self.inner.resident.lock();
        let mut ids: Vec<String> = resident.keys().cloned().collect();
        ids.sort();
        ResidencyStatus {
            used_mb: resident.values().map(|r| r.memory_mb).sum(),
            budget_mb: self.inner.budget_mb,
            resident: ids,
            active_leases: resident.values().map(|r| r.leases).sum(),
        }
    }
    
    /// Number of High-tier models currently resident
    pub fn large_resident_count(&self) -> usize {
        self.inner
            .resident
            .lock()
            .values()
            .filter(|r| r.tier == ModelTier::High)
            .count()
    }
    
    /// Total times a model has been leased
    pub fn use_count(&self, model_id: &str) -> u64 {
        self.inner
            .resident
            .lock()
            .get(model_id)
            .map(|r| r.use_count)
            .unwrap_or(0)
    }
}
