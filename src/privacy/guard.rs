//! Privacy guard
//!
//! Checks and charges the budget before any noise is drawn, so a
//! rejected request leaves both the budget and the value untouched.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::Distribution;

use crate::core::types::AnalyticsPayload;

use super::budget::PrivacyBudget;
use super::config::PrivacyConfig;
use super::error::{PrivacyError, PrivacyResult};
use super::mechanisms::{gaussian_noise, gaussian_sigma, laplace_scale, sample_laplace};
use super::types::{
    BudgetSnapshot, LedgerEntry, NoiseMechanism, PrivacyMarker, ProtectedBatch, ProtectedValue,
};

/// Applies calibrated noise under a shared ε budget
pub struct PrivacyGuard {
    config: PrivacyConfig,
    budget: Mutex<PrivacyBudget>,
    rng: Mutex<StdRng>,
}

impl PrivacyGuard {
    pub fn new(config: PrivacyConfig) -> PrivacyResult<Self> {
        Self::build(config, StdRng::from_entropy())
    }
    
    /// Deterministic noise for reproducible runs
    pub fn with_seed(config: PrivacyConfig, seed: u64) -> PrivacyResult<Self> {
        Self::build(config, StdRng::seed_from_u64(seed))
    }
    
    fn build(config: PrivacyConfig, rng: StdRng) -> PrivacyResult<Self> {
        let budget = PrivacyBudget::new(config.total_epsilon, config.delta)?;
        Ok(Self {
            config,
            budget: Mutex::new(budget),
            rng: Mutex::new(rng),
        })
    }
    
    pub fn config(&self) -> &PrivacyConfig {
        &self.config
    }
    
    /// Protect a point value at the configured level (Laplace)
    pub fn protect(&self, raw: f64, sensitivity: f64) -> PrivacyResult<ProtectedValue> {
        self.protect_with(raw, sensitivity, self.config.epsilon_per_release())
    }
    
    /// Protect a point value with an explicit ε (Laplace)
    pub fn protect_with(&self, raw: f64, sensitivity: f64, epsilon: f64) -> PrivacyResult<ProtectedValue> {
        check_value(raw)?;
        check_sensitivity(sensitivity)?;
        
        let epoch = {
            let mut budget = self.budget.lock();
            budget
                .try_spend(epsilon, NoiseMechanism::Laplace, sensitivity, 1)
                .map_err(|e| self.log_rejection(e))?
                .epoch
        };
        
        let noise = sample_laplace(&mut *self.rng.lock(), laplace_scale(sensitivity, epsilon));
        tracing::debug!(epsilon, sensitivity, "Applied Laplace noise");
        
        Ok(ProtectedValue {
            value: raw + noise,
            epsilon_spent: epsilon,
            mechanism: NoiseMechanism::Laplace,
            epoch,
        })
    }
    
    /// Protect several values under one ε charge (Gaussian, split evenly)
    pub fn protect_many(&self, values: &[f64], sensitivity: f64, epsilon: f64) -> PrivacyResult<ProtectedBatch> {
        if values.is_empty() {
            return Err(PrivacyError::InvalidParameter {
                reason: "no values to protect".to_string(),
            });
        }
        for value in values {
            check_value(*value)?;
        }
        check_sensitivity(sensitivity)?;
        
        // ε and δ are both split across the values so the charge composes to (ε, δ)
        let count = values.len() as f64;
        let (epoch, sigma, noise) = {
            let mut budget = self.budget.lock();
            let sigma = gaussian_sigma(sensitivity, epsilon / count, budget.delta() / count);
            let noise = gaussian_noise(sigma)?;
            let epoch = budget
                .try_spend(epsilon, NoiseMechanism::Gaussian, sensitivity, values.len())
                .map_err(|e| self.log_rejection(e))?
                .epoch;
            (epoch, sigma, noise)
        };
        
        let mut rng = self.rng.lock();
        let noised = values
            .iter()
            .map(|v| v + noise.sample(&mut *rng))
            .collect();
        tracing::debug!(epsilon, count = values.len(), sigma, "Applied Gaussian noise");
        
        Ok(ProtectedBatch {
            values: noised,
            epsilon_spent: epsilon,
            mechanism: NoiseMechanism::Gaussian,
            epoch,
        })
    }
    
    /// Protect every numeric metric of a payload.
    ///
    /// One metric uses Laplace, several use Gaussian composition under a
    /// single charge. A payload without metrics costs nothing.
    pub fn protect_payload(&self, payload: &AnalyticsPayload) -> PrivacyResult<(AnalyticsPayload, PrivacyMarker)> {
        let epsilon = self.config.epsilon_per_release();
        let mut protected = payload.clone();
        
        let values = payload.metric_values();
        
        match values.as_slice() {
            [] => {
                let epoch = self.budget.lock().epoch();
                Ok((
                    protected,
                    PrivacyMarker {
                        epsilon_spent: 0.0,
                        mechanism: None,
                        epoch,
                    },
                ))
            }
            [value] => {
                let result = self.protect_with(*value, self.config.sensitivity_for(*value), epsilon)?;
                for slot in protected.metrics.values_mut() {
                    *slot = result.value;
                }
                Ok((
                    protected,
                    PrivacyMarker {
                        epsilon_spent: result.epsilon_spent,
                        mechanism: Some(result.mechanism),
                        epoch: result.epoch,
                    },
                ))
            }
            _ => {
                let sensitivity = values
                    .iter()
                    .map(|v| self.config.sensitivity_for(*v))
                    .fold(0.0f64, f64::max);
                let batch = self.protect_many(&values, sensitivity, epsilon)?;
                for (slot, value) in protected.metrics.values_mut().zip(batch.values.iter()) {
                    *slot = *value;
                }
                Ok((
                    protected,
                    PrivacyMarker {
                        epsilon_spent: batch.epsilon_spent,
                        mechanism: Some(batch.mechanism),
                        epoch: batch.epoch,
                    },
                ))
            }
        }
    }
    
    /// Whether a charge of ε would currently succeed
    pub fn can_afford(&self, epsilon: f64) -> bool {
        self.budget.lock().can_spend(epsilon)
    }
    
    /// Operator action: start a new epoch with a full budget
    pub fn refresh(&self, new_total: Option<f64>) -> PrivacyResult<BudgetSnapshot> {
        let mut budget = self.budget.lock();
        let epoch = budget.refresh(new_total)?;
        tracing::info!(epoch, total = budget.total(), "Privacy budget refreshed");
        Ok(budget.snapshot(self.config.low_budget_fraction))
    }
    
    pub fn snapshot(&self) -> BudgetSnapshot {
        self.budget.lock().snapshot(self.config.low_budget_fraction)
    }
    
    /// Copy of the full ledger
    pub fn ledger(&self) -> Vec<LedgerEntry> {
        self.budget.lock().ledger().to_vec()
    }
    
    fn log_rejection(&self, err: PrivacyError) -> PrivacyError {
        if let PrivacyError::BudgetExhausted { requested, remaining } = &err {
            tracing::warn!(requested, remaining, "Privacy budget exhausted");
        }
        err
    }
}

fn check_value(value: f64) -> PrivacyResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(PrivacyError::InvalidParameter {
            reason: format!("value {value} is not finite"),
        })
    }
}

fn check_sensitivity(sensitivity: f64) -> PrivacyResult<()> {
    if sensitivity.is_finite() && sensitivity > 0.0 {
        Ok(())
    } else {
        Err(PrivacyError::InvalidParameter {
            reason: format!("sensitivity {sensitivity} must be positive"),
        })
    }
}
