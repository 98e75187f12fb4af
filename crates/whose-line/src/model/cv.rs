//! K-fold cross-validation over the regularization path.
//!
//! Folds are assigned by a seeded shuffle dealt round-robin, fitted in
//! parallel, and collected by fold index — the selected lambda never depends
//! on which fold finished first.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use sprs::CsMat;
use tracing::debug;

use super::lasso::{fit_path_at, sigmoid, PathConfig, PathPoint};
use super::ModelError;

#[derive(Clone, Debug)]
pub struct CvConfig {
    pub folds: usize,
    pub seed: u64,
}

impl Default for CvConfig {
    fn default() -> Self {
        Self { folds: 10, seed: 42 }
    }
}

/// Mean out-of-fold binomial deviance and its standard error at one lambda.
#[derive(Clone, Debug)]
pub struct CvCurvePoint {
    pub lambda: f64,
    pub mean_deviance: f64,
    pub std_error: f64,
}

#[derive(Clone, Debug)]
pub struct CvResult {
    pub curve: Vec<CvCurvePoint>,
    /// Index into the lambda sequence with the lowest mean deviance.
    pub min_index: usize,
    /// Largest lambda whose mean deviance is within one standard error of
    /// the minimum.
    pub one_se_index: usize,
}

impl CvResult {
    pub fn lambda_min(&self) -> f64 {
        self.curve[self.min_index].lambda
    }

    pub fn lambda_1se(&self) -> f64 {
        self.curve[self.one_se_index].lambda
    }
}

/// Mean binomial deviance of a path point over the given rows.
fn mean_deviance(
    matrix: &CsMat<f64>,
    labels: &[f64],
    rows: &[usize],
    point: &PathPoint,
) -> f64 {
    let mut total = 0.0;
    for &i in rows {
        let row = matrix.outer_view(i).expect("validation row in range");
        let eta: f64 =
            point.intercept + row.iter().map(|(j, &x)| point.weights[j] * x).sum::<f64>();
        let p = sigmoid(eta).clamp(1e-12, 1.0 - 1e-12);
        let y = labels[i];
        total += -2.0 * (y * p.ln() + (1.0 - y) * (1.0 - p).ln());
    }
    total / rows.len() as f64
}

/// Copy the rows of a CSR matrix flagged true in `keep`.
fn select_rows(matrix: &CsMat<f64>, keep: &[bool]) -> CsMat<f64> {
    let mut indptr = vec![0];
    let mut indices = Vec::new();
    let mut data = Vec::new();
    let mut rows = 0;
    for (i, row) in matrix.outer_iterator().enumerate() {
        if !keep[i] {
            continue;
        }
        for (j, &v) in row.iter() {
            indices.push(j);
            data.push(v);
        }
        indptr.push(indices.len());
        rows += 1;
    }
    CsMat::new((rows, matrix.cols()), indptr, indices, data)
}

/// Cross-validate the lambda sequence, returning the deviance curve and the
/// `lambda.min` / `lambda.1se` reference points.
pub fn cross_validate(
    matrix: &CsMat<f64>,
    labels: &[f64],
    lambdas: &[f64],
    cv: &CvConfig,
    path_cfg: &PathConfig,
) -> Result<CvResult, ModelError> {
    let n = matrix.rows();
    let k = cv.folds.min(n);
    if k < 2 {
        return Err(ModelError::InvalidFolds {
            requested: cv.folds,
            rows: n,
        });
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut StdRng::seed_from_u64(cv.seed));
    let mut fold_of = vec![0usize; n];
    for (pos, &row) in order.iter().enumerate() {
        fold_of[row] = pos % k;
    }

    let fold_deviances: Vec<Vec<f64>> = (0..k)
        .into_par_iter()
        .map(|fold| -> Result<Vec<f64>, ModelError> {
            let keep: Vec<bool> = fold_of.iter().map(|&f| f != fold).collect();
            let train_matrix = select_rows(matrix, &keep);
            let train_labels: Vec<f64> = labels
                .iter()
                .zip(&keep)
                .filter(|(_, &kept)| kept)
                .map(|(&y, _)| y)
                .collect();
            let path = fit_path_at(&train_matrix, &train_labels, lambdas, path_cfg)?;

            let val_rows: Vec<usize> = (0..n).filter(|&i| fold_of[i] == fold).collect();
            Ok(path
                .iter()
                .map(|point| mean_deviance(matrix, labels, &val_rows, point))
                .collect())
        })
        .collect::<Result<Vec<_>, ModelError>>()?;

    let kf = k as f64;
    let mut curve = Vec::with_capacity(lambdas.len());
    for (li, &lambda) in lambdas.iter().enumerate() {
        let mean = fold_deviances.iter().map(|devs| devs[li]).sum::<f64>() / kf;
        let var = fold_deviances
            .iter()
            .map(|devs| (devs[li] - mean).powi(2))
            .sum::<f64>()
            / (kf - 1.0);
        curve.push(CvCurvePoint {
            lambda,
            mean_deviance: mean,
            std_error: (var / kf).sqrt(),
        });
    }

    // first minimum wins, so exact ties resolve to the larger lambda
    let mut min_index = 0;
    for (i, point) in curve.iter().enumerate() {
        if point.mean_deviance < curve[min_index].mean_deviance {
            min_index = i;
        }
    }
    let threshold = curve[min_index].mean_deviance + curve[min_index].std_error;
    // Lambdas descend, so the first qualifying index is the most regularized.
    let one_se_index = curve
        .iter()
        .position(|point| point.mean_deviance <= threshold)
        .expect("min_index always qualifies");

    debug!(
        lambda_min = curve[min_index].lambda,
        lambda_1se = curve[one_se_index].lambda,
        folds = k,
        "Cross-validation complete"
    );
    Ok(CvResult {
        curve,
        min_index,
        one_se_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::lasso::{lambda_max, lambda_sequence};

    /// 20 rows, clean separation: column 0 marks positives, column 1 marks
    /// negatives, columns 2-3 are noise shared by both classes.
    fn toy() -> (CsMat<f64>, Vec<f64>) {
        let mut indptr = vec![0];
        let mut indices = Vec::new();
        let mut data = Vec::new();
        let mut labels = Vec::new();
        for i in 0..20 {
            let positive = i < 10;
            if positive {
                indices.push(0);
                data.push(2.0);
            } else {
                indices.push(1);
                data.push(2.0);
            }
            indices.push(2 + (i % 2));
            data.push(1.0);
            indptr.push(indices.len());
            labels.push(if positive { 1.0 } else { 0.0 });
        }
        (CsMat::new((20, 4), indptr, indices, data), labels)
    }

    #[test]
    fn one_se_lambda_is_at_least_lambda_min() {
        let (matrix, labels) = toy();
        let cfg = PathConfig::default();
        let lambdas = lambda_sequence(lambda_max(&matrix.to_csc(), &labels), &cfg);
        let result = cross_validate(
            &matrix,
            &labels,
            &lambdas,
            &CvConfig { folds: 5, seed: 42 },
            &cfg,
        )
        .unwrap();
        assert!(result.lambda_1se() >= result.lambda_min());
        assert!(result.one_se_index <= result.min_index);
    }

    #[test]
    fn curve_is_deterministic_for_a_fixed_seed() {
        let (matrix, labels) = toy();
        let cfg = PathConfig::default();
        let lambdas = lambda_sequence(lambda_max(&matrix.to_csc(), &labels), &cfg);
        let cv = CvConfig { folds: 4, seed: 7 };
        let first = cross_validate(&matrix, &labels, &lambdas, &cv, &cfg).unwrap();
        let second = cross_validate(&matrix, &labels, &lambdas, &cv, &cfg).unwrap();
        for (a, b) in first.curve.iter().zip(&second.curve) {
            assert_eq!(a.mean_deviance, b.mean_deviance);
            assert_eq!(a.std_error, b.std_error);
        }
        assert_eq!(first.min_index, second.min_index);
    }

    #[test]
    fn too_few_rows_for_folds_fails() {
        let (matrix, labels) = toy();
        let keep: Vec<bool> = (0..20).map(|i| i == 0).collect();
        let single = select_rows(&matrix, &keep);
        let err = cross_validate(
            &single,
            &labels[..1],
            &[0.1],
            &CvConfig { folds: 5, seed: 0 },
            &PathConfig::default(),
        );
        assert!(matches!(
            err,
            Err(ModelError::InvalidFolds { requested: 5, rows: 1 })
        ));
    }

    #[test]
    fn select_rows_keeps_shape_and_values() {
        let (matrix, _) = toy();
        let keep: Vec<bool> = (0..20).map(|i| i % 2 == 0).collect();
        let selected = select_rows(&matrix, &keep);
        assert_eq!(selected.rows(), 10);
        assert_eq!(selected.cols(), 4);
        assert_eq!(selected.get(0, 0), Some(&2.0));
    }
}
