//! Query pipeline
//!
//! Wires the screener, semantic cache, batch scheduler, model selector,
//! privacy guard, quality scorer and audit trail into `submit_query`.

mod builder;
mod engine;
mod executor;
mod response;

#[cfg(test)]
mod tests;

pub use builder::PipelineBuilder;
pub use engine::QueryPipeline;
pub use executor::PipelineExecutor;
pub use response::{PerformanceReport, PipelineResponse, ThreatAnnotation};
