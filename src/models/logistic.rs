//! Binary logistic regression fitted by Newton's method

use crate::config::ModelConfig;
use crate::error::{PipelineError, Result};
use crate::scaler::ScaledFeatures;
use ndarray::{s, Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Added to the intercept's Hessian diagonal, which carries no penalty
const INTERCEPT_JITTER: f64 = 1e-10;

/// Smallest fraction of a Newton step tried during backtracking
const MIN_STEP_SCALE: f64 = 1e-6;

/// Learned linear decision boundary in scaled-feature space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelState {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    /// Newton iterations the fit took
    pub iterations: usize,
}

impl ModelState {
    /// Number of features the model expects.
    pub fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    /// Fraud probability per row, in `[0, 1]`.
    pub fn predict_proba(&self, features: &ScaledFeatures) -> Result<Vec<f64>> {
        if features.n_features() != self.n_features() {
            return Err(PipelineError::SchemaMismatch {
                expected: vec![format!("{} features", self.n_features())],
                found: features.columns.clone(),
            });
        }

        let coef = Array1::from(self.coefficients.clone());
        let logits = features.values.dot(&coef) + self.intercept;
        Ok(logits.iter().map(|&z| sigmoid(z)).collect())
    }

    /// Class per row using `threshold` on the fraud probability.
    pub fn predict_with_threshold(&self, features: &ScaledFeatures, threshold: f64) -> Result<Vec<u8>> {
        Ok(self
            .predict_proba(features)?
            .into_iter()
            .map(|p| u8::from(p >= threshold))
            .collect())
    }

    /// Class per row at the default 0.5 threshold.
    pub fn predict(&self, features: &ScaledFeatures) -> Result<Vec<u8>> {
        self.predict_with_threshold(features, 0.5)
    }
}

/// L2-regularised logistic regression trainer.
///
/// Minimises `0.5 * ||w||^2 + C * sum(log_loss)` with the intercept left
/// unpenalised. Each Newton step solves the Hessian system by Cholesky
/// factorisation and is halved while it would increase the objective.
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    max_iter: usize,
    tolerance: f64,
    /// Inverse regularisation strength `C`
    regularization: f64,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::from(&ModelConfig::default())
    }
}

impl From<&ModelConfig> for LogisticRegression {
    fn from(config: &ModelConfig) -> Self {
        Self {
            max_iter: config.max_iter,
            tolerance: config.tolerance,
            regularization: config.regularization,
        }
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_regularization(mut self, c: f64) -> Self {
        self.regularization = c;
        self
    }

    /// Fit on scaled training features and 0/1 labels.
    pub fn fit(&self, features: &ScaledFeatures, labels: &[u8]) -> Result<ModelState> {
        let (n, p) = features.values.dim();
        if n != labels.len() {
            return Err(PipelineError::LengthMismatch {
                predicted: n,
                actual: labels.len(),
            });
        }
        if n == 0 {
            return Err(PipelineError::InsufficientData(
                "cannot fit a classifier on zero rows".to_string(),
            ));
        }
        if !labels.contains(&0) || !labels.contains(&1) {
            return Err(PipelineError::InsufficientData(
                "training labels must contain both classes".to_string(),
            ));
        }

        let design = with_intercept_column(features.values.view());
        let y = Array1::from_iter(labels.iter().map(|&l| f64::from(l)));
        let c = self.regularization;

        // penalty applies to coefficients only
        let mut penalty = Array1::<f64>::ones(p + 1);
        penalty[p] = 0.0;

        let mut theta = Array1::<f64>::zeros(p + 1);

        for iteration in 1..=self.max_iter {
            let probs = design.dot(&theta).mapv(sigmoid);
            let gradient = design.t().dot(&(&probs - &y)) * c + &penalty * &theta;

            let weights = probs.mapv(|q| q * (1.0 - q));
            let weighted = &design * &weights.view().insert_axis(Axis(1));
            let mut hessian = weighted.t().dot(&design) * c;
            for j in 0..=p {
                hessian[[j, j]] += if j < p { 1.0 } else { INTERCEPT_JITTER };
            }

            let step = cholesky_solve(&hessian, &gradient).ok_or_else(|| {
                PipelineError::Convergence {
                    iterations: iteration,
                    reason: "Hessian is not positive definite".to_string(),
                }
            })?;

            // halve the step until the objective stops increasing
            let current = objective(&design, &y, &theta, &penalty, c);
            let mut scale = 1.0;
            let mut candidate = &theta - &step;
            while objective(&design, &y, &candidate, &penalty, c) > current && scale > MIN_STEP_SCALE {
                scale *= 0.5;
                candidate = &theta - &(&step * scale);
            }
            theta = candidate;

            if theta.iter().any(|v| !v.is_finite()) {
                return Err(PipelineError::Convergence {
                    iterations: iteration,
                    reason: "parameters diverged to non-finite values".to_string(),
                });
            }

            let max_step = step.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
            if max_step < self.tolerance {
                debug!(iterations = iteration, features = p, "Logistic regression converged");
                return Ok(ModelState {
                    coefficients: theta.slice(s![..p]).to_vec(),
                    intercept: theta[p],
                    iterations: iteration,
                });
            }
        }

        Err(PipelineError::Convergence {
            iterations: self.max_iter,
            reason: format!("step size still above tolerance {}", self.tolerance),
        })
    }
}

/// Numerically stable logistic function.
fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Penalised negative log-likelihood at `theta`.
fn objective(
    design: &Array2<f64>,
    y: &Array1<f64>,
    theta: &Array1<f64>,
    penalty: &Array1<f64>,
    c: f64,
) -> f64 {
    let logits = design.dot(theta);
    let loss: f64 = logits
        .iter()
        .zip(y.iter())
        .map(|(&z, &t)| softplus(z) - t * z)
        .sum();
    let norm: f64 = theta.iter().zip(penalty.iter()).map(|(w, m)| m * w * w).sum();
    c * loss + 0.5 * norm
}

/// `ln(1 + e^z)` without overflow.
fn softplus(z: f64) -> f64 {
    z.max(0.0) + (-z.abs()).exp().ln_1p()
}

/// `[x | 1]`: the feature matrix with a trailing column of ones.
fn with_intercept_column(x: ArrayView2<f64>) -> Array2<f64> {
    let (n, p) = x.dim();
    let mut design = Array2::<f64>::ones((n, p + 1));
    design.slice_mut(s![.., ..p]).assign(&x);
    design
}

/// Solve `a * x = b` for symmetric positive definite `a`; `None` if `a` is not.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let m = a.nrows();
    let mut l = Array2::<f64>::zeros((m, m));

    for i in 0..m {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if !(sum > 0.0) {
                    return None;
                }
                l[[i, i]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }

    // forward: L z = b
    let mut z = Array1::<f64>::zeros(m);
    for i in 0..m {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[[i, k]] * z[k];
        }
        z[i] = sum / l[[i, i]];
    }

    // backward: L^T x = z
    let mut x = Array1::<f64>::zeros(m);
    for i in (0..m).rev() {
        let mut sum = z[i];
        for k in (i + 1)..m {
            sum -= l[[k, i]] * x[k];
        }
        x[i] = sum / l[[i, i]];
    }

    Some(x)
}
