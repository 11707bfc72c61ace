//! Quality and uncertainty scoring
//!
//! - Query complexity estimation
//! - Confidence with missing-input, outlier and complexity penalties
//! - Symmetric uncertainty interval and weighted composite score
//! - Operational recommendations from aggregated metrics

mod complexity;
mod config;
mod recommend;
mod scorer;
mod types;


pub use complexity::ComplexityEstimate;
pub use config::{QualityConfig, RecommendationThresholds};
pub use recommend::{
    PerformanceInputs, QuantizationEstimate, Recommendation, RecommendationEngine,
    RecommendationKind,
};
pub use scorer::{outlier_fraction, zero_fraction, QualityScorer};
pub use types::{PenaltyBreakdown, QualityReport};
