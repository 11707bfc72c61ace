//! Core module
//!
//! Shared building blocks of the pipeline:
//! - Configuration loading and validation
//! - Error taxonomy
//! - Query and payload types
//! - Utility functions

pub mod config;
pub mod error;
pub mod types;
pub mod utils;

pub use config::{ConfigError, ConfigResult, PipelineConfig, StageTimeouts};
pub use error::{PipelineError, Result, Stage};
pub use types::{AnalyticsPayload, ComputationPath, Query, QueryCategory, CALLER_ID_KEY};
