//! Core data types for the query pipeline
//!
//! Defines the query and response structures shared by every stage.

pub mod query;
pub mod response;

pub use query::{Query, QueryCategory, CALLER_ID_KEY};
pub use response::{AnalyticsPayload, ComputationPath};
