//! Noise mechanisms

use rand::Rng;
use rand_distr::Normal;

use super::error::{PrivacyError, PrivacyResult};

/// Laplace scale b = Δ/ε
pub fn laplace_scale(sensitivity: f64, epsilon: f64) -> f64 {
    sensitivity / epsilon
}

/// Gaussian σ = √(2 ln(1.25/δ))·Δ/ε
pub fn gaussian_sigma(sensitivity: f64, epsilon: f64, delta: f64) -> f64 {
    (2.0 * (1.25 / delta).ln()).sqrt() * sensitivity / epsilon
}

/// Sample Laplace(0, scale) by inverse CDF
pub fn sample_laplace<R: Rng + ?Sized>(rng: &mut R, scale: f64) -> f64 {
    // u in (-0.5, 0.5), excluding the endpoint that maps to infinity
    let mut u: f64 = rng.gen::<f64>() - 0.5;
    while u.abs() >= 0.5 {
        u = rng.gen::<f64>() - 0.5;
    }
    -scale * u.signum() * (1.0 - 2.0 * u.abs()).ln()
}

/// N(0, σ²) noise for the Gaussian mechanism
pub fn gaussian_noise(sigma: f64) -> PrivacyResult<Normal<f64>> {
    if !(sigma.is_finite() && sigma > 0.0) {
        return Err(PrivacyError::InvalidParameter {
            reason: format!("gaussian sigma {sigma} must be positive and finite"),
        });
    }
    Normal::new(0.0, sigma).map_err(|e| PrivacyError::InvalidParameter {
        reason: format!("gaussian sigma {sigma}: {e}"),
    })
}
