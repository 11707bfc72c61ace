//! Inference collaborators
//!
//! The pipeline does not run models itself. It talks to:
//! - an `InferenceBackend` that computes analytics for a batch of queries
//! - a `TabularSource` describing the records behind those analytics

mod backend;
mod error;
mod types;

#[cfg(test)]
mod tests;

pub use backend::{InferenceBackend, StaticTabularSource, TabularSource};
pub use error::{InferenceError, InferenceResult};
pub use types::{DataSnapshot, RawResult, TOTAL_REVENUE_KEY};
