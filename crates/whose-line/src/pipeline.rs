use core::fmt;

use serde::{Deserialize, Serialize};
use whose_line_pre_processing::corpus::DocumentId;
use whose_line_pre_processing::pre_processor::TokenizedDocument;

use crate::model::{sigmoid, FittedModel};

/// Which of the two works a document is attributed to. `Positive` is the
/// first requested work, the class the fitted probabilities point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Attribution {
    Positive,
    Negative,
}

impl Attribution {
    /// Returns true if this attribution is the positive-class work
    #[must_use]
    pub fn is_positive(&self) -> bool {
        matches!(self, Self::Positive)
    }
}

impl fmt::Display for Attribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Positive => write!(f, "positive"),
            Self::Negative => write!(f, "negative"),
        }
    }
}

/// Probability that a document belongs to the positive-class work.
#[derive(Debug, Clone, Copy)]
pub struct Prediction(f64);

impl Prediction {
    fn new(probability: f64) -> Self {
        debug_assert!(
            (0.0..=1.0).contains(&probability),
            "probability must lie in [0, 1]"
        );
        Self(probability)
    }

    #[must_use]
    pub fn probability(&self) -> f64 {
        self.0
    }

    /// Probability of the other work.
    #[must_use]
    pub fn complement(&self) -> f64 {
        1.0 - self.0
    }

    #[inline]
    #[must_use]
    pub fn classification(&self, threshold: f64) -> Attribution {
        if self.0 >= threshold {
            Attribution::Positive
        } else {
            Attribution::Negative
        }
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P(positive)={:.3}", self.0)
    }
}

/// Linear predictor for one document: the intercept plus the fitted estimate
/// of every token occurrence. Tokens the penalty discarded (or that were
/// never in the vocabulary) contribute zero, so an all-out-of-vocabulary
/// document scores at exactly the intercept.
pub fn linear_score(model: &FittedModel, tokens: &[String]) -> f64 {
    tokens
        .iter()
        .fold(model.intercept(), |acc, token| acc + model.coefficient(token))
}

/// Score one document's token stream into a probability.
pub fn score(model: &FittedModel, tokens: &[String]) -> Prediction {
    Prediction::new(sigmoid(linear_score(model, tokens)))
}

/// A scored document, keyed for downstream joins.
#[derive(Debug, Clone, Copy)]
pub struct ScoredDocument {
    pub id: DocumentId,
    pub prediction: Prediction,
}

/// Score a batch of tokenized documents, preserving input order.
pub fn score_documents(model: &FittedModel, tokenized: &[TokenizedDocument]) -> Vec<ScoredDocument> {
    tokenized
        .iter()
        .map(|doc| ScoredDocument {
            id: doc.id,
            prediction: score(model, &doc.tokens),
        })
        .collect()
}
