//! L1-penalized binomial logistic regression.
//!
//! Cyclic coordinate descent on the quadratic majorization of the logistic
//! loss (per-observation curvature bounded by 1/4), soft-thresholding each
//! coordinate so discarded terms are exactly zero. The intercept is never
//! penalized. Fits run down a descending lambda sequence with warm starts,
//! so the whole path costs little more than the final point.

use sprs::CsMat;
use tracing::{debug, trace};

use super::ModelError;

#[derive(Clone, Debug)]
pub struct PathConfig {
    /// Number of lambda values on the regularization path.
    pub n_lambda: usize,
    /// Smallest lambda, as a fraction of the smallest all-zero lambda.
    pub lambda_min_ratio: f64,
    /// Coordinate-descent sweep budget per lambda.
    pub max_sweeps: usize,
    /// Convergence: largest per-sweep coefficient change.
    pub tol: f64,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            n_lambda: 50,
            lambda_min_ratio: 1e-3,
            max_sweeps: 1_000,
            tol: 1e-6,
        }
    }
}

/// Solution at one point of the regularization path.
#[derive(Clone, Debug)]
pub struct PathPoint {
    pub lambda: f64,
    pub intercept: f64,
    pub weights: Vec<f64>,
}

impl PathPoint {
    pub fn nonzero_indices(&self) -> Vec<usize> {
        self.weights
            .iter()
            .enumerate()
            .filter(|(_, &w)| w != 0.0)
            .map(|(j, _)| j)
            .collect()
    }
}

#[inline]
pub(crate) fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

#[inline]
fn soft_threshold(z: f64, gamma: f64) -> f64 {
    if z > gamma {
        z - gamma
    } else if z < -gamma {
        z + gamma
    } else {
        0.0
    }
}

/// Smallest lambda at which every coefficient is zero: the largest absolute
/// per-feature gradient of the loss at the intercept-only fit.
pub(crate) fn lambda_max(csc: &CsMat<f64>, labels: &[f64]) -> f64 {
    let n = labels.len() as f64;
    let ybar = labels.iter().sum::<f64>() / n;
    let mut max = 0.0f64;
    for col in csc.outer_iterator() {
        let grad: f64 = col.iter().map(|(i, &x)| x * (ybar - labels[i])).sum::<f64>() / n;
        max = max.max(grad.abs());
    }
    max
}

/// Descending log-spaced lambda sequence from `lambda_max` down to
/// `lambda_max * lambda_min_ratio`.
pub(crate) fn lambda_sequence(lambda_max: f64, cfg: &PathConfig) -> Vec<f64> {
    let n = cfg.n_lambda.max(2);
    let log_max = lambda_max.ln();
    let log_min = (lambda_max * cfg.lambda_min_ratio).ln();
    (0..n)
        .map(|i| (log_max + (log_min - log_max) * i as f64 / (n - 1) as f64).exp())
        .collect()
}

/// Fit the penalized model at each lambda in `lambdas` (descending order
/// expected), warm starting every fit from the previous solution.
///
/// Degenerate single-class labels do not error here: the intercept saturates
/// and all weights stay near zero, which is what cross-validation folds with
/// an unlucky draw need. Callers wanting a loud failure check class balance
/// before fitting, as [`LassoTrainer::fit`](super::LassoTrainer::fit) does.
pub fn fit_path_at(
    matrix: &CsMat<f64>,
    labels: &[f64],
    lambdas: &[f64],
    cfg: &PathConfig,
) -> Result<Vec<PathPoint>, ModelError> {
    let n = matrix.rows();
    if labels.len() != n {
        return Err(ModelError::Alignment {
            labels: labels.len(),
            rows: n,
        });
    }
    if n == 0 || lambdas.is_empty() {
        return Err(ModelError::EmptyPath);
    }

    let csc = matrix.to_csc();
    let n_features = matrix.cols();
    let nf = n as f64;

    // Majorization curvature per coordinate: sum of squares over 4n.
    let curvature: Vec<f64> = csc
        .outer_iterator()
        .map(|col| col.iter().map(|(_, &x)| x * x).sum::<f64>() / (4.0 * nf))
        .collect();

    let ybar = (labels.iter().sum::<f64>() / nf).clamp(1e-9, 1.0 - 1e-9);
    let mut intercept = (ybar / (1.0 - ybar)).ln();
    let mut weights = vec![0.0f64; n_features];
    let mut eta = vec![intercept; n];

    let mut path = Vec::with_capacity(lambdas.len());
    for &lambda in lambdas {
        let mut sweeps = 0usize;
        loop {
            let mut max_delta = 0.0f64;

            let grad0: f64 = eta
                .iter()
                .zip(labels)
                .map(|(&e, &y)| sigmoid(e) - y)
                .sum::<f64>()
                / nf;
            let delta0 = -grad0 / 0.25;
            intercept += delta0;
            for e in &mut eta {
                *e += delta0;
            }
            max_delta = max_delta.max(delta0.abs());

            for (j, col) in csc.outer_iterator().enumerate() {
                let h = curvature[j];
                if h == 0.0 {
                    continue;
                }
                let grad: f64 = col
                    .iter()
                    .map(|(i, &x)| x * (sigmoid(eta[i]) - labels[i]))
                    .sum::<f64>()
                    / nf;
                let w_old = weights[j];
                let w_new = soft_threshold(h * w_old - grad, lambda) / h;
                let delta = w_new - w_old;
                if delta != 0.0 {
                    weights[j] = w_new;
                    for (i, &x) in col.iter() {
                        eta[i] += delta * x;
                    }
                    max_delta = max_delta.max(delta.abs());
                }
            }

            sweeps += 1;
            if max_delta < cfg.tol || sweeps >= cfg.max_sweeps {
                break;
            }
        }
        trace!(lambda, sweeps, "Path point converged");
        path.push(PathPoint {
            lambda,
            intercept,
            weights: weights.clone(),
        });
    }
    debug!(points = path.len(), "Regularization path fitted");
    Ok(path)
}

/// Fit the full default path, deriving the lambda sequence from the data.
pub fn fit_path(
    matrix: &CsMat<f64>,
    labels: &[f64],
    cfg: &PathConfig,
) -> Result<Vec<PathPoint>, ModelError> {
    if labels.len() != matrix.rows() {
        return Err(ModelError::Alignment {
            labels: labels.len(),
            rows: matrix.rows(),
        });
    }
    let lmax = lambda_max(&matrix.to_csc(), labels);
    if lmax <= 0.0 {
        return Err(ModelError::EmptyPath);
    }
    fit_path_at(matrix, labels, &lambda_sequence(lmax, cfg), cfg)
}
