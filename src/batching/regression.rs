//! Ridge regression over standardized features

use nalgebra::{Cholesky, DMatrix, DVector};
use ndarray::{Array1, Array2, Axis};

use super::error::RegressionError;

/// Ridge regression with an unregularized intercept.
///
/// Features are centered and scaled per column before solving
/// `(ZᵀZ + αI) w = Zᵀ(y - ȳ)`. Constant columns contribute nothing.
#[derive(Debug, Clone)]
pub struct RidgeRegression {
    alpha: f64,
    weights: Option<Array1<f64>>,
    intercept: f64,
    means: Array1<f64>,
    scales: Array1<f64>,
}

impl RidgeRegression {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: alpha.max(0.0),
            weights: None,
            intercept: 0.0,
            means: Array1::zeros(0),
            scales: Array1::zeros(0),
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.weights.is_some()
    }

    pub fn weights(&self) -> Option<&Array1<f64>> {
        self.weights.as_ref()
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn fit(&mut self, features: &Array2<f64>, targets: &Array1<f64>) -> Result<(), RegressionError> {
        let rows = features.nrows();
        if rows == 0 {
            return Err(RegressionError::Empty);
        }
        if targets.len() != rows {
            return Err(RegressionError::ShapeMismatch {
                features: rows,
                targets: targets.len(),
            });
        }

        let means = features.mean_axis(Axis(0)).ok_or(RegressionError::Empty)?;
        let centered = features - &means;
        let scales = centered
            .mapv(|v| v * v)
            .mean_axis(Axis(0))
            .ok_or(RegressionError::Empty)?
            .mapv(|var| {
                let std = var.sqrt();
                if std > 1e-12 { std } else { 1.0 }
            });
        let standardized = &centered / &scales;

        let target_mean = targets.mean().ok_or(RegressionError::Empty)?;
        let centered_targets = targets - target_mean;

        let cols = standardized.ncols();
        let gram = standardized.t().dot(&standardized) + Array2::<f64>::eye(cols) * self.alpha;
        let rhs = standardized.t().dot(&centered_targets);

        let weights = solve(&gram, &rhs)?;

        self.weights = Some(weights);
        self.intercept = target_mean;
        self.means = means;
        self.scales = scales;
        Ok(())
    }

    /// Predict for one feature row. `None` before the first fit or on a width mismatch.
    pub fn predict(&self, features: &[f64]) -> Option<f64> {
        let weights = self.weights.as_ref()?;
        if features.len() != weights.len() {
            return None;
        }
        let value = features
            .iter()
            .zip(self.means.iter())
            .zip(self.scales.iter())
            .zip(weights.iter())
            .map(|(((x, mean), scale), w)| (x - mean) / scale * w)
            .sum::<f64>()
            + self.intercept;
        Some(value)
    }
}

/// Solve the symmetric positive definite system through its Cholesky factor
fn solve(gram: &Array2<f64>, rhs: &Array1<f64>) -> Result<Array1<f64>, RegressionError> {
    let n = rhs.len();
    if n == 0 {
        return Ok(Array1::zeros(0));
    }
    let a = DMatrix::from_fn(n, n, |i, j| gram[[i, j]]);
    let b = DVector::from_iterator(n, rhs.iter().copied());
    let chol = Cholesky::new(a).ok_or(RegressionError::Singular)?;
    let x = chol.solve(&b);
    if x.iter().any(|v| !v.is_finite()) {
        return Err(RegressionError::Singular);
    }
    Ok(Array1::from_iter(x.iter().copied()))
}
