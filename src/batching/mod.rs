//! Adaptive batch scheduling
//!
//! - Load snapshots (CPU, queue depth, memory headroom)
//! - Rolling-window ridge regression predicting the batch size
//! - Jobs dispatched on fill or max-wait, with per-item results
//! - Dispatch outcomes fed back as new observations

mod config;
mod error;
mod load;
mod predictor;
mod regression;
mod scheduler;


pub use config::BatchConfig;
pub use error::{BatchError, BatchResult, RegressionError};
pub use load::{LoadProbe, LoadSnapshot, StaticLoadProbe, SystemLoadProbe};
pub use predictor::{Observation, SizePredictor};
pub use regression::RidgeRegression;
pub use scheduler::{
    observed_optimal, AdaptiveBatchScheduler, BatchExecutor, BatchStats, BatchTicket,
    DispatchReason,
};
