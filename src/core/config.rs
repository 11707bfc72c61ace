//! Configuration module for the query pipeline
//!
//! Aggregates the per-stage settings into [`PipelineConfig`]:
//! - Threat screening thresholds
//! - Semantic cache capacity and similarity threshold
//! - Batch scheduling window and max-wait
//! - Privacy budget (ε, δ) and level
//! - Hardware tier cutoffs and stage timeouts
//!
//! Configuration is layered: defaults, then an optional file, then
//! `MOAT__SECTION__KEY` environment overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::audit::{AuditConfig, GovernanceConfig};
use crate::batching::BatchConfig;
use crate::cache::CacheConfig;
use crate::embeddings::EmbeddingConfig;
use crate::logging::LoggingConfig;
use crate::privacy::PrivacyConfig;
use crate::quality::QualityConfig;
use crate::screening::ScreeningConfig;
use crate::selector::SelectorConfig;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "MOAT";

/// Default configuration file name inside the platform config directory
pub const CONFIG_FILE_NAME: &str = "pipeline.toml";

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Main pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Threat screening
    pub screening: ScreeningConfig,

    /// Feature embedding
    pub embedding: EmbeddingConfig,

    /// Semantic cache
    pub cache: CacheConfig,

    /// Model selection and hardware tiers
    pub selector: SelectorConfig,

    /// Adaptive batching
    pub batching: BatchConfig,

    /// Differential privacy
    pub privacy: PrivacyConfig,

    /// Quality scoring
    pub quality: QualityConfig,

    /// Governance confidence gate
    pub governance: GovernanceConfig,

    /// Audit delivery
    pub audit: AuditConfig,

    /// Per-stage timeouts
    pub timeouts: StageTimeouts,

    /// Logging
    pub logging: LoggingConfig,
}

/// Independent timeouts per pipeline stage, in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StageTimeouts {
    pub screening_ms: u64,
    pub cache_lookup_ms: u64,
    /// Added on top of the batch max-wait
    pub batch_wait_grace_ms: u64,
    pub inference_ms: u64,
    pub privacy_ms: u64,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            screening_ms: 1_000,
            cache_lookup_ms: 1_000,
            batch_wait_grace_ms: 250,
            inference_ms: 30_000,
            privacy_ms: 1_000,
        }
    }
}

impl StageTimeouts {
    pub fn screening(&self) -> Duration {
        Duration::from_millis(self.screening_ms)
    }

    pub fn cache_lookup(&self) -> Duration {
        Duration::from_millis(self.cache_lookup_ms)
    }

    pub fn inference(&self) -> Duration {
        Duration::from_millis(self.inference_ms)
    }

    pub fn privacy(&self) -> Duration {
        Duration::from_millis(self.privacy_ms)
    }

    /// Upper bound on waiting for a batch to dispatch
    pub fn batch_wait(&self, max_wait: Duration) -> Duration {
        max_wait + Duration::from_millis(self.batch_wait_grace_ms)
    }
}

impl PipelineConfig {
    /// Load configuration from defaults, an optional file, and environment overrides.
    ///
    /// An explicit `path` must exist. Without one, the platform default
    /// location is used when present.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut builder = config::Config::builder();

        match path {
            Some(path) => {
                builder = builder.add_source(config::File::from(path).required(true));
            }
            None => {
                if let Some(default_path) = default_config_path() {
                    builder =
                        builder.add_source(config::File::from(default_path).required(false));
                }
            }
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let loaded: PipelineConfig = settings.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Check cross-field invariants.
    pub fn validate(&self) -> ConfigResult<()> {
        let unit = |field: &'static str, value: f64| -> ConfigResult<()> {
            if value.is_finite() && value > 0.0 && value <= 1.0 {
                Ok(())
            } else {
                Err(ConfigError::Invalid {
                    field,
                    reason: format!("{value} is outside (0, 1]"),
                })
            }
        };

        unit("screening.block_threshold", self.screening.block_threshold as f64)?;
        unit("screening.monitor_threshold", self.screening.monitor_threshold as f64)?;
        if self.screening.monitor_threshold >= self.screening.block_threshold {
            return Err(ConfigError::Invalid {
                field: "screening.monitor_threshold",
                reason: "must be below the block threshold".to_string(),
            });
        }

        if self.embedding.dimension == 0 {
            return Err(ConfigError::Invalid {
                field: "embedding.dimension",
                reason: "must be positive".to_string(),
            });
        }

        unit("cache.similarity_threshold", self.cache.similarity_threshold as f64)?;
        if self.cache.capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "cache.capacity",
                reason: "must be positive".to_string(),
            });
        }
        if self.cache.half_life_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "cache.half_life_secs",
                reason: "must be positive".to_string(),
            });
        }

        if self.batching.max_batch_size == 0 {
            return Err(ConfigError::Invalid {
                field: "batching.max_batch_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.batching.default_batch_size == 0
            || self.batching.default_batch_size > self.batching.max_batch_size
        {
            return Err(ConfigError::Invalid {
                field: "batching.default_batch_size",
                reason: format!("must be within [1, {}]", self.batching.max_batch_size),
            });
        }

        if !(self.privacy.total_epsilon.is_finite() && self.privacy.total_epsilon > 0.0) {
            return Err(ConfigError::Invalid {
                field: "privacy.total_epsilon",
                reason: "must be positive".to_string(),
            });
        }
        if !(self.privacy.delta > 0.0 && self.privacy.delta < 1.0) {
            return Err(ConfigError::Invalid {
                field: "privacy.delta",
                reason: format!("{} is outside (0, 1)", self.privacy.delta),
            });
        }

        unit("governance.confidence_threshold", self.governance.confidence_threshold as f64)?;

        let weights = self.quality.confidence_weight
            + self.quality.quality_weight
            + self.quality.security_weight;
        if (weights - 1.0).abs() > 1e-3 {
            return Err(ConfigError::Invalid {
                field: "quality",
                reason: format!("composite weights sum to {weights:.3}, expected 1.0"),
            });
        }

        if self.selector.cutoffs.medium_min_memory_mb > self.selector.cutoffs.high_min_memory_mb {
            return Err(ConfigError::Invalid {
                field: "selector.cutoffs",
                reason: "medium memory cutoff exceeds high cutoff".to_string(),
            });
        }

        Ok(())
    }
}

/// Platform configuration file location (e.g. `~/.config/moat-core/pipeline.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("com", "moatmetrics", "moat-core")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert!((config.cache.similarity_threshold - 0.85).abs() < f32::EPSILON);
        assert!((config.screening.block_threshold - 0.8).abs() < f32::EPSILON);
        assert!((config.screening.monitor_threshold - 0.4).abs() < f32::EPSILON);
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[cache]\nsimilarity_threshold = 0.9\ncapacity = 42\n\n[privacy]\ntotal_epsilon = 2.5"
        )
        .unwrap();

        let config = PipelineConfig::load(Some(&path)).unwrap();
        assert!((config.cache.similarity_threshold - 0.9).abs() < 1e-6);
        assert_eq!(config.cache.capacity, 42);
        assert!((config.privacy.total_epsilon - 2.5).abs() < 1e-9);
        // untouched sections keep their defaults
        assert_eq!(config.batching.max_batch_size, BatchConfig::default().max_batch_size);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = PipelineConfig::load(Some(&dir.path().join("absent.toml")));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_validate_rejects_inverted_thresholds() {
        let mut config = PipelineConfig::default();
        config.screening.monitor_threshold = 0.9;
        config.screening.block_threshold = 0.8;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "screening.monitor_threshold",
                ..
            })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_privacy_parameters() {
        let mut config = PipelineConfig::default();
        config.privacy.delta = 1.5;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.privacy.total_epsilon = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_batch_wait_includes_grace() {
        let timeouts = StageTimeouts::default();
        assert_eq!(
            timeouts.batch_wait(Duration::from_millis(500)),
            Duration::from_millis(750)
        );
    }
}
