//! Rolling statistical baseline for query shape
//!
//! Tracks query length and special-character ratio over a bounded
//! window. Only queries that were not blocked are learned, so injection
//! attempts cannot drag the baseline toward themselves.

use std::collections::VecDeque;

/// Standard-deviation floors keep near-constant baselines from flagging
/// every small deviation.
const LENGTH_STD_FLOOR: f64 = 5.0;
const RATIO_STD_FLOOR: f64 = 0.02;

/// Shape features of one query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryShape {
    pub length: f64,
    pub special_ratio: f64,
}

impl QueryShape {
    pub fn of(text: &str) -> Self {
        Self {
            length: text.chars().count() as f64,
            special_ratio: crate::core::utils::special_char_ratio(text),
        }
    }
}

/// Bounded window of observed shapes
#[derive(Debug)]
pub struct RollingBaseline {
    window: usize,
    min_samples: usize,
    samples: VecDeque<QueryShape>,
}

impl RollingBaseline {
    pub fn new(window: usize, min_samples: usize) -> Self {
        Self {
            window: window.max(1),
            min_samples,
            samples: VecDeque::with_capacity(window.max(1)),
        }
    }

    /// Whether enough samples exist to score
    pub fn is_active(&self) -> bool {
        self.samples.len() >= self.min_samples.max(2)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn observe(&mut self, shape: QueryShape) {
        if self.samples.len() == self.window {
            self.samples.pop_front();
        }
        self.samples.push_back(shape);
    }

    /// Largest absolute z-score across features, or `None` while warming up
    pub fn z_score(&self, shape: &QueryShape) -> Option<f64> {
        if !self.is_active() {
            return None;
        }

        let (len_mean, len_std) = mean_std(self.samples.iter().map(|s| s.length));
        let (ratio_mean, ratio_std) = mean_std(self.samples.iter().map(|s| s.special_ratio));

        let len_z = (shape.length - len_mean).abs() / len_std.max(LENGTH_STD_FLOOR);
        let ratio_z = (shape.special_ratio - ratio_mean).abs() / ratio_std.max(RATIO_STD_FLOOR);
        Some(len_z.max(ratio_z))
    }
}

fn mean_std(values: impl Iterator<Item = f64> + Clone) -> (f64, f64) {
    let n = values.clone().count();
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = values.clone().sum::<f64>() / n as f64;
    let var = values.map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
    (mean, var.sqrt())
}
