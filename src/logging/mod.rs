//! Logging and metrics for the query pipeline
//!
//! - `tracing-subscriber` registry with an env filter
//! - Text or JSON output to console, rolling file, or both
//! - Aggregated per-stage performance metrics

mod config;
mod metrics;


pub use config::{default_log_directory, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig};
pub use metrics::{
    names, time_operation, MetricEntry, MetricStats, MetricType, MetricsCollector,
    PerformanceMetrics, TimerGuard,
};

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Logging system errors
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to initialize logging: {0}")]
    InitializationError(String),

    #[error("Failed to create log directory: {0}")]
    DirectoryCreationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for logging operations
pub type LoggingResult<T> = Result<T, LoggingError>;

/// Installed subscriber plus the file writer guard.
///
/// Dropping this flushes and stops the background file writer.
pub struct LoggingSystem {
    config: LoggingConfig,
    metrics: Arc<MetricsCollector>,
    _guards: Vec<WorkerGuard>,
}

impl LoggingSystem {
    /// Install the global subscriber. Fails if one is already set.
    pub fn init(config: LoggingConfig) -> LoggingResult<Self> {
        let mut guards = Vec::new();
        let env_filter = Self::build_env_filter(&config);
        let registry = tracing_subscriber::registry();

        match config.output {
            LogOutput::Console => {
                registry
                    .with(env_filter)
                    .with(Self::create_console_layer(&config))
                    .try_init()
                    .map_err(|e| LoggingError::InitializationError(e.to_string()))?;
            }
            LogOutput::File => {
                let (file_layer, guard) = Self::create_file_layer(&config)?;
                guards.push(guard);
                registry
                    .with(env_filter)
                    .with(file_layer)
                    .try_init()
                    .map_err(|e| LoggingError::InitializationError(e.to_string()))?;
            }
            LogOutput::Both => {
                let (file_layer, guard) = Self::create_file_layer(&config)?;
                guards.push(guard);
                registry
                    .with(env_filter)
                    .with(Self::create_console_layer(&config))
                    .with(file_layer)
                    .try_init()
                    .map_err(|e| LoggingError::InitializationError(e.to_string()))?;
            }
        }

        let metrics = Arc::new(MetricsCollector::with_capacity(config.metrics_history));

        tracing::info!(
            level = %config.level,
            output = ?config.output,
            format = ?config.format,
            "Logging initialized"
        );

        Ok(Self {
            config,
            metrics,
            _guards: guards,
        })
    }

    /// `RUST_LOG` wins over the configured directives when set
    fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.filter_directives()))
    }

    fn create_console_layer<S>(config: &LoggingConfig) -> Box<dyn Layer<S> + Send + Sync>
    where
        S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    {
        let layer = fmt::layer()
            .with_target(config.include_target)
            .with_thread_ids(config.include_thread_id)
            .with_file(config.include_file_info)
            .with_line_number(config.include_file_info);

        if config.format == LogFormat::Json {
            layer.json().boxed()
        } else {
            layer.boxed()
        }
    }

    fn create_file_layer<S>(
        config: &LoggingConfig,
    ) -> LoggingResult<(Box<dyn Layer<S> + Send + Sync>, WorkerGuard)>
    where
        S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    {
        let log_dir = config
            .log_directory
            .clone()
            .unwrap_or_else(default_log_directory);

        std::fs::create_dir_all(&log_dir).map_err(|e| {
            LoggingError::DirectoryCreationError(format!("{}: {}", log_dir.display(), e))
        })?;

        let rotation = match config.rotation {
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Daily => Rotation::DAILY,
            LogRotation::Never => Rotation::NEVER,
        };

        let file_appender = RollingFileAppender::new(rotation, &log_dir, &config.file_prefix);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let layer = fmt::layer()
            .with_writer(non_blocking)
            .with_target(config.include_target)
            .with_thread_ids(config.include_thread_id)
            .with_file(config.include_file_info)
            .with_line_number(config.include_file_info)
            .with_ansi(false);

        if config.format == LogFormat::Json {
            Ok((layer.json().boxed(), guard))
        } else {
            Ok((layer.boxed(), guard))
        }
    }

    /// Collector sized by `metrics_history`
    pub fn metrics(&self) -> Arc<MetricsCollector> {
        Arc::clone(&self.metrics)
    }

    pub fn log_directory(&self) -> Option<PathBuf> {
        if self.config.writes_file() {
            Some(
                self.config
                    .log_directory
                    .clone()
                    .unwrap_or_else(default_log_directory),
            )
        } else {
            None
        }
    }

    pub fn log_level(&self) -> LogLevel {
        self.config.level
    }
}

/// Initialize logging with custom configuration
pub fn init_logging(config: LoggingConfig) -> LoggingResult<LoggingSystem> {
    LoggingSystem::init(config)
}

/// Evaluate a block and record its duration under `$name` at debug level
#[macro_export]
macro_rules! timed_debug {
    ($metrics:expr, $name:expr, $($arg:tt)*) => {{
        let start = std::time::Instant::now();
        let result = { $($arg)* };
        let duration = start.elapsed();
        $metrics.record_duration($name, duration);
        tracing::debug!(
            target: "performance",
            operation = $name,
            duration_ms = duration.as_millis() as u64,
            "Operation completed"
        );
        result
    }};
}
