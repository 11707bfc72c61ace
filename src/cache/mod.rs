//! Semantic response cache
//!
//! - Cosine-similarity lookup over query embeddings
//! - Retention-score eviction (quality decayed by idle time)
//! - Caller-restricted, short-lived entries for monitored queries
//! - Consistency checks that drop corrupt entries
//! - Cold-start warming from precomputed seeds

mod bootstrap;
mod config;
mod entry;
mod error;
mod semantic;


pub use bootstrap::{CacheSeed, COMMON_QUERIES};
pub use config::CacheConfig;
pub use entry::{CacheEntry, CacheHit, CorruptionReport, InsertOptions, LookupOutcome};
pub use error::{CacheError, CacheResult};
pub use semantic::{CacheStats, SemanticCache};
