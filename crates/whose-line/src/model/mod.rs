//! Model fitting: label alignment, the LASSO trainer, and the fitted
//! coefficient set the scoring pipeline consumes.

mod cv;
mod lasso;

pub use cv::{cross_validate, CvConfig, CvCurvePoint, CvResult};
pub use lasso::{fit_path, fit_path_at, PathConfig, PathPoint};

pub(crate) use lasso::sigmoid;

use ahash::HashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use whose_line_pre_processing::corpus::{Document, DocumentId};
use whose_line_pre_processing::pre_processor::{CountMatrix, Vocabulary};

#[derive(thiserror::Error, Debug)]
pub enum ModelError {
    /// Label vector length does not match the matrix row count.
    #[error("label vector has {labels} entries but the matrix has {rows} rows")]
    Alignment { labels: usize, rows: usize },

    /// A matrix row's document id has no corresponding document.
    #[error("no document found for matrix row {id}")]
    MissingLabel { id: DocumentId },

    /// Training labels contain only one class.
    #[error("training split is single-class ({positives} positive, {negatives} negative)")]
    DegenerateClass { positives: usize, negatives: usize },

    /// Not enough rows to form the requested folds.
    #[error("{requested} folds requested but only {rows} rows available")]
    InvalidFolds { requested: usize, rows: usize },

    /// No usable lambda sequence (empty input or zero gradient everywhere).
    #[error("regularization path is empty")]
    EmptyPath,
}

/// Binary labels keyed to matrix rows by document id.
///
/// Built by joining `row_ids` against the documents' titles, so positional
/// misalignment between rows and labels cannot arise; the length check in
/// [`LassoTrainer::fit`] remains as a belt-and-braces assertion.
#[derive(Clone, Debug)]
pub struct LabelVector {
    values: Vec<f64>,
    positive_title: String,
}

impl LabelVector {
    pub fn from_documents(
        row_ids: &[DocumentId],
        documents: &[Document],
        positive_title: &str,
    ) -> Result<Self, ModelError> {
        let title_of: HashMap<DocumentId, &str> = documents
            .iter()
            .map(|doc| (doc.id, doc.title.as_str()))
            .collect();

        let values = row_ids
            .iter()
            .map(|id| {
                title_of
                    .get(id)
                    .map(|&title| if title == positive_title { 1.0 } else { 0.0 })
                    .ok_or(ModelError::MissingLabel { id: *id })
            })
            .collect::<Result<Vec<f64>, ModelError>>()?;

        Ok(Self {
            values,
            positive_title: positive_title.to_string(),
        })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn positive_title(&self) -> &str {
        &self.positive_title
    }

    fn class_counts(&self) -> (usize, usize) {
        let positives = self.values.iter().filter(|&&y| y > 0.5).count();
        (positives, self.values.len() - positives)
    }
}

/// How the regularization strength is chosen.
#[derive(Clone, Debug)]
pub enum LambdaRule {
    /// K-fold CV, pick the one-standard-error lambda (the parsimonious
    /// default the rest of the pipeline uses).
    CrossValidatedOneSe { folds: usize },
    /// K-fold CV, pick the minimum-deviance lambda.
    CrossValidatedMin { folds: usize },
    /// Skip CV and fit at the given lambda.
    Fixed(f64),
}

#[derive(Clone, Debug)]
pub struct TrainerConfig {
    pub rule: LambdaRule,
    pub seed: u64,
    pub path: PathConfig,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            rule: LambdaRule::CrossValidatedOneSe { folds: 10 },
            seed: 42,
            path: PathConfig::default(),
        }
    }
}

pub struct LassoTrainer {
    config: TrainerConfig,
}

impl LassoTrainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    /// Fit the penalized logistic regression and return the coefficients at
    /// the selected lambda.
    pub fn fit(
        &self,
        matrix: &CountMatrix,
        labels: &LabelVector,
        vocabulary: &Vocabulary,
    ) -> Result<FittedModel, ModelError> {
        if labels.len() != matrix.rows() {
            return Err(ModelError::Alignment {
                labels: labels.len(),
                rows: matrix.rows(),
            });
        }
        let (positives, negatives) = labels.class_counts();
        if positives == 0 || negatives == 0 {
            return Err(ModelError::DegenerateClass {
                positives,
                negatives,
            });
        }

        let csr = matrix.matrix();
        let lmax = lasso::lambda_max(&csr.to_csc(), labels.values());
        if lmax <= 0.0 {
            return Err(ModelError::EmptyPath);
        }

        let (point, lambda_min, lambda_1se) = match self.config.rule {
            LambdaRule::Fixed(lambda) => {
                let lambdas = fixed_lambda_sequence(lmax, lambda, &self.config.path);
                let mut path =
                    lasso::fit_path_at(csr, labels.values(), &lambdas, &self.config.path)?;
                let point = path.pop().ok_or(ModelError::EmptyPath)?;
                (point, None, None)
            }
            LambdaRule::CrossValidatedOneSe { folds }
            | LambdaRule::CrossValidatedMin { folds } => {
                let lambdas = lasso::lambda_sequence(lmax, &self.config.path);
                let cv_result = cv::cross_validate(
                    csr,
                    labels.values(),
                    &lambdas,
                    &CvConfig {
                        folds,
                        seed: self.config.seed,
                    },
                    &self.config.path,
                )?;
                let chosen = match self.config.rule {
                    LambdaRule::CrossValidatedMin { .. } => cv_result.min_index,
                    _ => cv_result.one_se_index,
                };
                let path =
                    lasso::fit_path_at(csr, labels.values(), &lambdas, &self.config.path)?;
                let point = path[chosen].clone();
                (
                    point,
                    Some(cv_result.lambda_min()),
                    Some(cv_result.lambda_1se()),
                )
            }
        };

        let coefficients: HashMap<String, f64> = point
            .weights
            .iter()
            .enumerate()
            .filter(|(_, &w)| w != 0.0)
            .map(|(j, &w)| (vocabulary.term(j).to_string(), w))
            .collect();

        info!(
            lambda = point.lambda,
            nonzero_terms = coefficients.len(),
            "Model fitted"
        );
        Ok(FittedModel {
            intercept: point.intercept,
            coefficients,
            lambda: point.lambda,
            lambda_min,
            lambda_1se,
            positive_title: labels.positive_title().to_string(),
        })
    }
}

/// Warm-start sequence for a fixed target lambda: the standard descending
/// path truncated at, and ending exactly on, the target.
fn fixed_lambda_sequence(lmax: f64, target: f64, cfg: &PathConfig) -> Vec<f64> {
    if target >= lmax {
        return vec![target];
    }
    let mut lambdas: Vec<f64> = lasso::lambda_sequence(lmax, cfg)
        .into_iter()
        .take_while(|&l| l > target)
        .collect();
    lambdas.push(target);
    lambdas
}

/// Coefficients selected at one regularization strength. Terms absent from
/// `coefficients` have an implicit estimate of zero.
#[derive(Clone, Debug)]
pub struct FittedModel {
    intercept: f64,
    coefficients: HashMap<String, f64>,
    lambda: f64,
    lambda_min: Option<f64>,
    lambda_1se: Option<f64>,
    positive_title: String,
}

impl FittedModel {
    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Fitted estimate for a term, zero if the penalty discarded it.
    pub fn coefficient(&self, term: &str) -> f64 {
        self.coefficients.get(term).copied().unwrap_or(0.0)
    }

    pub fn nonzero_terms(&self) -> usize {
        self.coefficients.len()
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    pub fn lambda_min(&self) -> Option<f64> {
        self.lambda_min
    }

    pub fn lambda_1se(&self) -> Option<f64> {
        self.lambda_1se
    }

    /// Title of the positive class (probability 1.0 end of the scale).
    pub fn positive_title(&self) -> &str {
        &self.positive_title
    }

    /// Reporting view: intercept plus every retained term, strongest
    /// positive estimate first, ties broken alphabetically.
    pub fn coefficient_table(&self) -> CoefficientTable {
        let mut terms: Vec<Coefficient> = self
            .coefficients
            .iter()
            .map(|(term, &estimate)| Coefficient {
                term: term.clone(),
                estimate,
            })
            .collect();
        terms.sort_by(|a, b| {
            b.estimate
                .total_cmp(&a.estimate)
                .then_with(|| a.term.cmp(&b.term))
        });
        CoefficientTable {
            intercept: self.intercept,
            terms,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Coefficient {
    pub term: String,
    pub estimate: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CoefficientTable {
    pub intercept: f64,
    pub terms: Vec<Coefficient>,
}
