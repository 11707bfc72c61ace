//! Privacy budget accounting
//!
//! Consumed ε never exceeds total ε. A request that would overshoot is
//! rejected and leaves the budget untouched. The budget is only
//! replenished by an explicit refresh, which starts a new epoch.

use chrono::Utc;
use std::collections::BTreeMap;

use super::error::{PrivacyError, PrivacyResult};
use super::types::{BudgetSnapshot, LedgerEntry, NoiseMechanism};

/// Slack for accumulated floating-point error when comparing against the total
const EPSILON_TOLERANCE: f64 = 1e-9;

/// ε/δ budget with an append-only ledger
#[derive(Debug, Clone)]
pub struct PrivacyBudget {
    total_epsilon: f64,
    consumed_epsilon: f64,
    delta: f64,
    epoch: u64,
    ledger: Vec<LedgerEntry>,
}

impl PrivacyBudget {
    pub fn new(total_epsilon: f64, delta: f64) -> PrivacyResult<Self> {
        validate_total(total_epsilon)?;
        if !(delta > 0.0 && delta < 1.0) {
            return Err(PrivacyError::InvalidParameter {
                reason: format!("delta {delta} outside (0, 1)"),
            });
        }
        Ok(Self {
            total_epsilon,
            consumed_epsilon: 0.0,
            delta,
            epoch: 0,
            ledger: Vec::new(),
        })
    }
    
    pub fn total(&self) -> f64 {
        self.total_epsilon
    }
    
    pub fn consumed(&self) -> f64 {
        self.consumed_epsilon
    }
    
    pub fn remaining(&self) -> f64 {
        (self.total_epsilon - self.consumed_epsilon).max(0.0)
    }
    
    pub fn delta(&self) -> f64 {
        self.delta
    }
    
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
    
    /// All charges across epochs, oldest first
    pub fn ledger(&self) -> &[LedgerEntry] {
        &self.ledger
    }
    
    pub fn can_spend(&self, epsilon: f64) -> bool {
        self.consumed_epsilon + epsilon <= self.total_epsilon + EPSILON_TOLERANCE
    }
    
    /// Charge ε, or reject without changing anything
    pub fn try_spend(
        &mut self,
        epsilon: f64,
        mechanism: NoiseMechanism,
        sensitivity: f64,
        value_count: usize,
    ) -> PrivacyResult<&LedgerEntry> {
        if !(epsilon.is_finite() && epsilon > 0.0) {
            return Err(PrivacyError::InvalidParameter {
                reason: format!("epsilon {epsilon} must be positive"),
            });
        }
        if !self.can_spend(epsilon) {
            return Err(PrivacyError::BudgetExhausted {
                requested: epsilon,
                remaining: self.remaining(),
            });
        }
        
        self.consumed_epsilon = (self.consumed_epsilon + epsilon).min(self.total_epsilon);
        let delta = match mechanism {
            NoiseMechanism::Gaussian => self.delta,
            NoiseMechanism::Laplace => 0.0,
        };
        self.ledger.push(LedgerEntry {
            mechanism,
            epsilon,
            delta,
            sensitivity,
            value_count,
            epoch: self.epoch,
            recorded_at: Utc::now(),
        });
        Ok(&self.ledger[self.ledger.len() - 1])
    }
    
    /// Start a new epoch with a full budget, optionally resized
    pub fn refresh(&mut self, new_total: Option<f64>) -> PrivacyResult<u64> {
        if let Some(total) = new_total {
            validate_total(total)?;
            self.total_epsilon = total;
        }
        self.consumed_epsilon = 0.0;
        self.epoch += 1;
        Ok(self.epoch)
    }
    
    pub fn snapshot(&self, low_fraction: f64) -> BudgetSnapshot {
        let current: Vec<&LedgerEntry> = self
            .ledger
            .iter()
            .filter(|entry| entry.epoch == self.epoch)
            .collect();
        let mut mechanism_usage = BTreeMap::new();
        for entry in &current {
            *mechanism_usage
                .entry(entry.mechanism.as_str().to_string())
                .or_insert(0) += 1;
        }
        let remaining = self.remaining();
        
        BudgetSnapshot {
            total_epsilon: self.total_epsilon,
            consumed_epsilon: self.consumed_epsilon,
            remaining_epsilon: remaining,
            delta: self.delta,
            epoch: self.epoch,
            operations: current.len(),
            mechanism_usage,
            is_exhausted: remaining <= EPSILON_TOLERANCE,
            is_low: remaining < self.total_epsilon * low_fraction,
        }
    }
}

fn validate_total(total: f64) -> PrivacyResult<()> {
    if total.is_finite() && total > 0.0 {
        Ok(())
    } else {
        Err(PrivacyError::InvalidParameter {
            reason: format!("total epsilon {total} must be positive"),
        })
    }
}
