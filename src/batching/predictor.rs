//! Batch size prediction from recent load observations

use std::collections::VecDeque;

use ndarray::{Array1, Array2};
use tracing::{debug, warn};

use super::config::BatchConfig;
use super::load::LoadSnapshot;
use super::regression::RidgeRegression;

/// One (load → observed optimal size) pair
#[derive(Debug, Clone, Copy)]
pub struct Observation {
    pub load: LoadSnapshot,
    pub optimal_size: usize,
}

/// Rolling-window ridge predictor for batch size
pub struct SizePredictor {
    window: VecDeque<Observation>,
    model: RidgeRegression,
    since_refit: usize,
    window_size: usize,
    min_samples: usize,
    refit_interval: usize,
    default_size: usize,
    max_size: usize,
}

impl SizePredictor {
    pub fn new(config: &BatchConfig) -> Self {
        let max_size = config.max_batch_size.max(1);
        Self {
            window: VecDeque::with_capacity(config.window_size),
            model: RidgeRegression::new(config.ridge_alpha),
            since_refit: 0,
            window_size: config.window_size.max(1),
            min_samples: config.min_samples.max(1),
            refit_interval: config.refit_interval.max(1),
            default_size: config.default_batch_size.clamp(1, max_size),
            max_size,
        }
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn is_fitted(&self) -> bool {
        self.model.is_fitted()
    }

    /// Add an observation, refitting when due.
    pub fn record(&mut self, load: LoadSnapshot, optimal_size: usize) {
        if self.window.len() == self.window_size {
            self.window.pop_front();
        }
        self.window.push_back(Observation { load, optimal_size });
        self.since_refit += 1;

        let due = self.since_refit >= self.refit_interval || !self.model.is_fitted();
        if due && self.window.len() >= self.min_samples {
            self.refit();
        }
    }

    /// Refit on the current window. Returns whether a model is in place afterwards.
    pub fn refit(&mut self) -> bool {
        if self.window.len() < self.min_samples {
            return self.model.is_fitted();
        }

        let rows = self.window.len();
        let mut features = Array2::<f64>::zeros((rows, LoadSnapshot::FEATURES));
        let mut targets = Array1::<f64>::zeros(rows);
        for (i, obs) in self.window.iter().enumerate() {
            for (j, value) in obs.load.features().iter().enumerate() {
                features[[i, j]] = *value;
            }
            targets[i] = obs.optimal_size as f64;
        }

        match self.model.fit(&features, &targets) {
            Ok(()) => {
                self.since_refit = 0;
                debug!(
                    samples = rows,
                    intercept = self.model.intercept(),
                    "Batch size model refit"
                );
            }
            Err(e) => warn!(error = %e, samples = rows, "Batch size refit failed"),
        }
        self.model.is_fitted()
    }

    /// Predicted size for the given load, always within `[1, max_batch_size]`.
    pub fn predict(&self, load: &LoadSnapshot) -> usize {
        match self.model.predict(&load.features()) {
            Some(value) if value.is_finite() => {
                (value.round().max(1.0) as usize).min(self.max_size)
            }
            _ => self.default_size,
        }
    }
}
