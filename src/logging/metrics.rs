//! Pipeline performance metrics
//!
//! Aggregated per-stage statistics consumed by the performance report and
//! the recommendation engine.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Metric names recorded by the pipeline
pub mod names {
    pub const QUERY_LATENCY: &str = "query_latency";
    pub const SCREENING: &str = "screening";
    pub const EMBEDDING: &str = "embedding";
    pub const CACHE_LOOKUP: &str = "cache_lookup";
    pub const BATCH_WAIT: &str = "batch_wait";
    pub const INFERENCE: &str = "inference";
    pub const PRIVACY: &str = "privacy";
    pub const BATCH_SIZE: &str = "batch_size";
    pub const COMPOSITE_SCORE: &str = "composite_score";
    pub const MEMORY_USAGE_MB: &str = "memory_usage_mb";
    pub const CACHE_HITS: &str = "cache_hits";
    pub const CACHE_MISSES: &str = "cache_misses";
    pub const QUERIES_BLOCKED: &str = "queries_blocked";
    pub const QUERY_ERRORS: &str = "query_errors";
}

/// Type of metric being recorded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MetricType {
    /// Duration of an operation
    Duration(Duration),
    /// Counter value
    Counter(u64),
    /// Gauge value (can go up or down)
    Gauge(f64),
}

impl MetricType {
    fn numeric(&self) -> f64 {
        match self {
            MetricType::Duration(d) => d.as_secs_f64() * 1000.0,
            MetricType::Counter(c) => *c as f64,
            MetricType::Gauge(g) => *g,
        }
    }
}

/// A single metric entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricEntry {
    pub name: String,
    pub value: MetricType,
    pub timestamp: DateTime<Utc>,
}

/// Aggregated statistics for a metric
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MetricStats {
    /// Number of samples
    pub count: u64,
    /// Sum of all values
    pub sum: f64,
    /// Minimum value
    pub min: f64,
    /// Maximum value
    pub max: f64,
    /// Mean value
    pub mean: f64,
    /// Last recorded value
    pub last: f64,
    /// Last update timestamp
    pub last_updated: Option<DateTime<Utc>>,
}

impl MetricStats {
    fn new() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            min: f64::MAX,
            max: f64::MIN,
            mean: 0.0,
            last: 0.0,
            last_updated: None,
        }
    }

    fn update(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.mean = self.sum / self.count as f64;
        self.last = value;
        self.last_updated = Some(Utc::now());
    }
}

/// Snapshot of pipeline metrics
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PerformanceMetrics {
    pub query_latency_ms: MetricStats,
    pub screening_ms: MetricStats,
    pub embedding_ms: MetricStats,
    pub cache_lookup_ms: MetricStats,
    pub batch_wait_ms: MetricStats,
    pub inference_ms: MetricStats,
    pub privacy_ms: MetricStats,
    pub batch_size: MetricStats,
    pub composite_score: MetricStats,
    pub memory_usage_mb: MetricStats,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub queries_blocked: u64,
    pub query_errors: u64,
}

impl PerformanceMetrics {
    /// Hits over lookups; 0 when nothing was looked up
    pub fn cache_hit_rate(&self) -> f64 {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups == 0 {
            0.0
        } else {
            self.cache_hits as f64 / lookups as f64
        }
    }
}

/// Metrics collector for recording and aggregating performance data
pub struct MetricsCollector {
    metrics: RwLock<HashMap<String, MetricStats>>,
    recent_entries: RwLock<VecDeque<MetricEntry>>,
    max_recent_entries: usize,
    total_recorded: AtomicU64,
    start_time: Instant,
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::with_capacity(1000)
    }

    /// Create a new metrics collector with custom capacity
    pub fn with_capacity(max_recent_entries: usize) -> Self {
        Self {
            metrics: RwLock::new(HashMap::new()),
            recent_entries: RwLock::new(VecDeque::with_capacity(max_recent_entries)),
            max_recent_entries,
            total_recorded: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a metric
    pub fn record(&self, name: &str, value: MetricType) {
        let numeric_value = value.numeric();

        {
            let mut metrics = self.metrics.write();
            let stats = metrics.entry(name.to_string()).or_insert_with(MetricStats::new);
            stats.update(numeric_value);
        }

        if self.max_recent_entries > 0 {
            let mut recent = self.recent_entries.write();
            if recent.len() >= self.max_recent_entries {
                recent.pop_front();
            }
            recent.push_back(MetricEntry {
                name: name.to_string(),
                value,
                timestamp: Utc::now(),
            });
        }

        self.total_recorded.fetch_add(1, Ordering::Relaxed);

        tracing::trace!(
            target: "metrics",
            metric_name = name,
            metric_value = numeric_value,
            "Metric recorded"
        );
    }

    /// Record a duration metric
    pub fn record_duration(&self, name: &str, duration: Duration) {
        self.record(name, MetricType::Duration(duration));
    }

    /// Record a gauge metric
    pub fn record_gauge(&self, name: &str, value: f64) {
        self.record(name, MetricType::Gauge(value));
    }

    /// Increment a counter
    pub fn increment(&self, name: &str) {
        let mut metrics = self.metrics.write();
        let stats = metrics.entry(name.to_string()).or_insert_with(MetricStats::new);
        stats.update(stats.last + 1.0);
    }

    /// Get statistics for a specific metric
    pub fn get_stats(&self, name: &str) -> Option<MetricStats> {
        self.metrics.read().get(name).cloned()
    }

    /// Get all metric statistics
    pub fn get_all_stats(&self) -> HashMap<String, MetricStats> {
        self.metrics.read().clone()
    }

    /// Recent entries for one metric, oldest first
    pub fn recent_values(&self, name: &str) -> Vec<f64> {
        self.recent_entries
            .read()
            .iter()
            .filter(|e| e.name == name)
            .map(|e| e.value.numeric())
            .collect()
    }

    /// Get total number of metrics recorded
    pub fn total_recorded(&self) -> u64 {
        self.total_recorded.load(Ordering::Relaxed)
    }

    /// Get uptime duration
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Clear all metrics
    pub fn clear(&self) {
        self.metrics.write().clear();
        self.recent_entries.write().clear();
        self.total_recorded.store(0, Ordering::Relaxed);
    }

    /// Get a summary of performance metrics
    pub fn get_performance_summary(&self) -> PerformanceMetrics {
        let metrics = self.metrics.read();
        let stats = |name: &str| metrics.get(name).cloned().unwrap_or_default();
        let count = |name: &str| metrics.get(name).map(|s| s.count).unwrap_or(0);

        PerformanceMetrics {
            query_latency_ms: stats(names::QUERY_LATENCY),
            screening_ms: stats(names::SCREENING),
            embedding_ms: stats(names::EMBEDDING),
            cache_lookup_ms: stats(names::CACHE_LOOKUP),
            batch_wait_ms: stats(names::BATCH_WAIT),
            inference_ms: stats(names::INFERENCE),
            privacy_ms: stats(names::PRIVACY),
            batch_size: stats(names::BATCH_SIZE),
            composite_score: stats(names::COMPOSITE_SCORE),
            memory_usage_mb: stats(names::MEMORY_USAGE_MB),
            cache_hits: count(names::CACHE_HITS),
            cache_misses: count(names::CACHE_MISSES),
            queries_blocked: count(names::QUERIES_BLOCKED),
            query_errors: count(names::QUERY_ERRORS),
        }
    }

    /// Export metrics as JSON
    pub fn export_json(&self) -> String {
        serde_json::to_string_pretty(&self.get_all_stats()).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Timer guard for automatic duration recording
pub struct TimerGuard<'a> {
    collector: &'a MetricsCollector,
    name: &'static str,
    start: Instant,
}

impl<'a> TimerGuard<'a> {
    pub fn new(collector: &'a MetricsCollector, name: &'static str) -> Self {
        Self {
            collector,
            name,
            start: Instant::now(),
        }
    }
}

impl<'a> Drop for TimerGuard<'a> {
    fn drop(&mut self) {
        self.collector.record_duration(self.name, self.start.elapsed());
    }
}

/// Convenience function to create a timer guard
pub fn time_operation<'a>(collector: &'a MetricsCollector, name: &'static str) -> TimerGuard<'a> {
    TimerGuard::new(collector, name)
}
