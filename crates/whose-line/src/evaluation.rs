//! Test-set evaluation: AUC-ROC, the confusion matrix, and seeded
//! inspection of misclassified documents.

use core::fmt;
use std::cmp::Ordering;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use whose_line_pre_processing::corpus::DocumentId;

use crate::pipeline::Attribution;

#[derive(thiserror::Error, Debug)]
pub enum EvalError {
    /// AUC is undefined when the test set holds a single class.
    #[error("test set is single-class ({positives} positive, {negatives} negative), AUC undefined")]
    DegenerateClass { positives: usize, negatives: usize },

    /// No scored documents to evaluate.
    #[error("no scored documents to evaluate")]
    EmptySample,
}

/// One test document's predicted probability joined with its true class.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub id: DocumentId,
    /// Probability of the positive-class work.
    pub probability: f64,
    /// True class from the document's source title.
    pub actual: Attribution,
}

/// Rank-based (Mann-Whitney) AUC-ROC with midranks for tied probabilities.
///
/// Fails rather than defaulting when the test set is single-class.
pub fn auc(results: &[ClassificationResult]) -> Result<f64, EvalError> {
    if results.is_empty() {
        return Err(EvalError::EmptySample);
    }
    let positives = results.iter().filter(|r| r.actual.is_positive()).count();
    let negatives = results.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(EvalError::DegenerateClass {
            positives,
            negatives,
        });
    }

    let n = results.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        results[a]
            .probability
            .partial_cmp(&results[b].probability)
            .unwrap_or(Ordering::Equal)
    });

    // midranks: tied probabilities share the average of their rank range
    let mut ranks = vec![0.0f64; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n
            && results[order[j + 1]].probability == results[order[i]].probability
        {
            j += 1;
        }
        let midrank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = midrank;
        }
        i = j + 1;
    }

    let positive_rank_sum: f64 = results
        .iter()
        .zip(&ranks)
        .filter(|(r, _)| r.actual.is_positive())
        .map(|(_, &rank)| rank)
        .sum();
    let np = positives as f64;
    let nn = negatives as f64;
    Ok((positive_rank_sum - np * (np + 1.0) / 2.0) / (np * nn))
}

/// Cross-tabulation of true class against thresholded prediction.
/// Positive = the first requested work.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_positive: usize,
    pub false_positive: usize,
    pub true_negative: usize,
    pub false_negative: usize,
}

impl ConfusionMatrix {
    pub fn from_results(results: &[ClassificationResult], threshold: f64) -> Self {
        let mut matrix = Self::default();
        for result in results {
            let predicted_positive = result.probability >= threshold;
            match (result.actual.is_positive(), predicted_positive) {
                (true, true) => matrix.true_positive += 1,
                (false, true) => matrix.false_positive += 1,
                (false, false) => matrix.true_negative += 1,
                (true, false) => matrix.false_negative += 1,
            }
        }
        matrix
    }

    pub fn total(&self) -> usize {
        self.true_positive + self.false_positive + self.true_negative + self.false_negative
    }

    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.true_positive + self.true_negative) as f64 / total as f64
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "acc={:.4} (tp={} fp={} tn={} fn={})",
            self.accuracy(),
            self.true_positive,
            self.false_positive,
            self.true_negative,
            self.false_negative,
        )
    }
}

/// Predicate over classification results for ad-hoc inspection, e.g.
/// "probability above 0.8 but actually from the other work".
#[derive(Clone, Copy, Debug)]
pub struct InspectionFilter {
    pub min_probability: f64,
    pub max_probability: f64,
    pub actual: Attribution,
}

impl InspectionFilter {
    /// Confidently called positive, actually negative.
    pub fn overconfident_positive(min_probability: f64) -> Self {
        Self {
            min_probability,
            max_probability: 1.0,
            actual: Attribution::Negative,
        }
    }

    /// Confidently called negative, actually positive.
    pub fn overconfident_negative(max_probability: f64) -> Self {
        Self {
            min_probability: 0.0,
            max_probability,
            actual: Attribution::Positive,
        }
    }

    pub fn matches(&self, result: &ClassificationResult) -> bool {
        result.actual == self.actual
            && result.probability >= self.min_probability
            && result.probability <= self.max_probability
    }
}

/// Draw up to `n` filtered results with a seeded generator; identical seeds
/// draw identical samples. The sample is returned in id order.
pub fn sample_misclassified<'a>(
    results: &'a [ClassificationResult],
    filter: &InspectionFilter,
    n: usize,
    seed: u64,
) -> Vec<&'a ClassificationResult> {
    let matched: Vec<&ClassificationResult> =
        results.iter().filter(|r| filter.matches(r)).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut sampled: Vec<&ClassificationResult> = matched
        .choose_multiple(&mut rng, n)
        .copied()
        .collect();
    sampled.sort_by_key(|r| r.id);
    sampled
}
