//! Model selection
//!
//! - Hardware tiers from memory, core count and accelerator presence
//! - Static ordered candidate lists per tier ending in a reliable fallback
//! - Per-request filtering by memory headroom and reliability
//! - Residency leases with a single large-model slot

mod catalog;
mod config;
mod hardware;
mod residency;
mod selector;

#[cfg(test)]
mod tests;

pub use catalog::{ModelProfile, ModelSpec, ModelTier, LLAMA3_8B, PHI3_MINI, TINYLLAMA};
pub use config::{SelectorConfig, TierCutoffs};
pub use hardware::{HardwareProbe, HardwareProfile, StaticHardwareProbe, SystemHardwareProbe};
pub use residency::{ModelLease, ResidencyError, ResidencyStatus, ResidencyTracker};
pub use selector::{ModelSelector, ModelUsage};
