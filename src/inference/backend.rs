//! Collaborator traits for model execution and tabular data

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;

use super::error::InferenceResult;
use super::types::{DataSnapshot, RawResult};
use crate::core::types::Query;
use crate::selector::ModelProfile;

/// Executes analytics queries on a model.
///
/// The outer error fails the whole call (the model could not run at all);
/// inner errors are per query. Implementations return one inner result per
/// query, in order.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    async fn compute(
        &self,
        queries: &[Arc<Query>],
        model: &ModelProfile,
    ) -> InferenceResult<Vec<InferenceResult<RawResult>>>;
}

/// Read-only access to the tabular records
#[async_trait]
pub trait TabularSource: Send + Sync {
    async fn snapshot(&self) -> InferenceResult<DataSnapshot>;
}

/// In-memory tabular source
#[derive(Default)]
pub struct StaticTabularSource {
    snapshot: RwLock<DataSnapshot>,
}

impl StaticTabularSource {
    pub fn new(snapshot: DataSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
        }
    }

    /// Replace the served snapshot
    pub fn update(&self, snapshot: DataSnapshot) {
        *self.snapshot.write() = snapshot;
    }
}

#[async_trait]
impl TabularSource for StaticTabularSource {
    async fn snapshot(&self) -> InferenceResult<DataSnapshot> {
        Ok(self.snapshot.read().clone())
    }
}
