//! Differential privacy guard
//!
//! - ε/δ budget with an append-only ledger and explicit refresh epochs
//! - Laplace noise for point values, Gaussian for composed values
//! - Payload protection with privacy markers for cache reuse
//! - PII sanitization of query text
//! - Pluggable secure computation (mock only)

mod budget;
mod config;
mod error;
mod guard;
mod mechanisms;
mod sanitizer;
mod secure;
mod types;

#[cfg(test)]
mod tests;

pub use budget::PrivacyBudget;
pub use config::PrivacyConfig;
pub use error::{PrivacyError, PrivacyResult};
pub use guard::PrivacyGuard;
pub use mechanisms::{gaussian_noise, gaussian_sigma, laplace_scale, sample_laplace};
pub use sanitizer::{QuerySanitizer, SanitizedText};
pub use secure::{PassthroughSecureComputation, SealedValue, SecureComputation};
pub use types::{
    BudgetSnapshot, LedgerEntry, NoiseMechanism, PrivacyLevel, PrivacyMarker, ProtectedBatch,
    ProtectedValue,
};
