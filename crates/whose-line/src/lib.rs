//! # whose-line
//!
//! Which novel did this line come from? A batch pipeline that trains an
//! L1-regularized logistic regression on sparse word counts from two
//! public-domain works and scores held-out lines.
//!
//! The five stages run strictly in order — load, tokenize, build the sparse
//! count matrix over a training split, fit with cross-validated lambda
//! selection, evaluate on the held-out split — and every stage is a pure
//! transform of the previous stage's output.
//!
//! ## Quick Start
//!
//! ```no_run
//! use whose_line::Analysis;
//! use whose_line_pre_processing::corpus::{load_corpus, GutenbergSource};
//!
//! let documents = load_corpus(
//!     &["The War of the Worlds", "Pride and Prejudice"],
//!     &GutenbergSource::new(),
//! )?;
//!
//! let report = Analysis::new(documents).with_seed(42).run()?;
//! println!("AUC: {:?}", report.auc);
//! println!("{}", report.confusion);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Tuning the run
//!
//! ```no_run
//! use whose_line::{Analysis, LambdaRule};
//! # use whose_line_pre_processing::corpus::{load_corpus, GutenbergSource};
//! # let documents = load_corpus(&["Emma"], &GutenbergSource::new())?;
//!
//! let report = Analysis::new(documents)
//!     .with_min_count(5)
//!     .with_train_fraction(0.8)
//!     .with_lambda_rule(LambdaRule::CrossValidatedMin { folds: 5 })
//!     .run()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

mod evaluation;
mod model;
mod pipeline;
mod split;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use whose_line_pre_processing::corpus::{Document, DocumentId};
use whose_line_pre_processing::pre_processor::{
    ranked_words, tokenize, CountMatrix, TokenizedDocument, VectorizeError, Vocabulary,
    WordCount,
};

pub use evaluation::{
    auc, sample_misclassified, ClassificationResult, ConfusionMatrix, EvalError,
    InspectionFilter,
};
pub use model::{
    Coefficient, CoefficientTable, CvConfig, CvResult, FittedModel, LabelVector, LambdaRule,
    LassoTrainer, ModelError, PathConfig, TrainerConfig,
};
pub use pipeline::{
    linear_score, score, score_documents, Attribution, Prediction, ScoredDocument,
};
pub use split::{split_documents, TrainTestSplit};

#[derive(thiserror::Error, Debug)]
pub enum AnalysisError {
    /// The corpus must contain exactly two distinct titles.
    #[error("expected exactly 2 distinct titles in the corpus, found {found}")]
    WrongClassCount { found: usize },

    #[error(transparent)]
    Vectorize(#[from] VectorizeError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// The positive/negative class titles, in request order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClassLabels {
    pub positive: String,
    pub negative: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct LambdaSummary {
    /// The lambda the reported coefficients were fitted at.
    pub selected: f64,
    /// Minimum cross-validated deviance point, when CV ran.
    pub min: Option<f64>,
    /// One-standard-error point, when CV ran.
    pub one_se: Option<f64>,
}

/// The pipeline's reporting surface: coefficient table, per-document
/// probability table, AUC, confusion matrix, plus the descriptive
/// word-frequency table.
#[derive(Clone, Debug, Serialize)]
pub struct AnalysisReport {
    pub class_labels: ClassLabels,
    pub lambda: LambdaSummary,
    pub coefficients: CoefficientTable,
    /// One row per test document, in id order.
    pub scores: Vec<ClassificationResult>,
    /// `None` when the test split is single-class (AUC undefined).
    pub auc: Option<f64>,
    pub confusion: ConfusionMatrix,
    /// Stop-word-filtered corpus word counts, purely descriptive.
    pub top_words: Vec<WordCount>,
}

/// Builder for one end-to-end run over an already-loaded corpus.
///
/// Defaults mirror the analysis this pipeline reproduces: vocabulary words
/// must occur more than 10 times, 75% of lines train, lambda comes from
/// 10-fold cross-validation at the one-standard-error point, and every
/// random draw derives from one seed.
pub struct Analysis {
    documents: Vec<Document>,
    min_count: usize,
    train_fraction: f64,
    threshold: f64,
    seed: u64,
    rule: LambdaRule,
    split: Option<TrainTestSplit>,
    top_words: usize,
}

impl Analysis {
    #[must_use]
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents,
            min_count: 10,
            train_fraction: 0.75,
            threshold: 0.5,
            seed: 42,
            rule: LambdaRule::CrossValidatedOneSe { folds: 10 },
            split: None,
            top_words: 20,
        }
    }

    /// Keep only words occurring strictly more than `min_count` times.
    #[must_use]
    pub fn with_min_count(mut self, min_count: usize) -> Self {
        self.min_count = min_count;
        self
    }

    #[must_use]
    pub fn with_train_fraction(mut self, train_fraction: f64) -> Self {
        self.train_fraction = train_fraction;
        self
    }

    /// Probability cutoff for hard predictions.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Seed for the split, fold assignment, and any sampled inspection.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_lambda_rule(mut self, rule: LambdaRule) -> Self {
        self.rule = rule;
        self
    }

    /// Use an explicit train/test split instead of the seeded shuffle.
    #[must_use]
    pub fn with_split(mut self, split: TrainTestSplit) -> Self {
        self.split = Some(split);
        self
    }

    #[must_use]
    pub fn with_top_words(mut self, top_words: usize) -> Self {
        self.top_words = top_words;
        self
    }

    /// Run the whole pipeline and collect the report.
    pub fn run(self) -> Result<AnalysisReport, AnalysisError> {
        let mut titles: Vec<&str> = Vec::new();
        for doc in &self.documents {
            if !titles.contains(&doc.title.as_str()) {
                titles.push(&doc.title);
            }
        }
        if titles.len() != 2 {
            return Err(AnalysisError::WrongClassCount {
                found: titles.len(),
            });
        }
        let class_labels = ClassLabels {
            positive: titles[0].to_string(),
            negative: titles[1].to_string(),
        };
        info!(
            positive = %class_labels.positive,
            negative = %class_labels.negative,
            documents = self.documents.len(),
            "Starting analysis"
        );

        let tokenized = tokenize(&self.documents);
        // Deliberately computed over the full corpus, split included: the
        // source analysis lets test-set word statistics shape the
        // vocabulary, and behavioral parity wins over hygiene here.
        let vocabulary = Vocabulary::build(&tokenized, self.min_count)?;

        let split = match self.split {
            Some(split) => split,
            None => {
                let ids: Vec<DocumentId> = self.documents.iter().map(|d| d.id).collect();
                split_documents(&ids, self.train_fraction, self.seed)
            }
        };

        let matrix = CountMatrix::build(&tokenized, &vocabulary, &split.train_ids)?;
        let labels = LabelVector::from_documents(
            matrix.row_ids(),
            &self.documents,
            &class_labels.positive,
        )?;
        let trainer = LassoTrainer::new(TrainerConfig {
            rule: self.rule,
            seed: self.seed,
            path: PathConfig::default(),
        });
        let model = trainer.fit(&matrix, &labels, &vocabulary)?;

        let mut test_docs: Vec<&TokenizedDocument> = tokenized
            .iter()
            .filter(|doc| split.test_ids.contains(&doc.id))
            .collect();
        test_docs.sort_by_key(|doc| doc.id);

        let mut scores = Vec::with_capacity(test_docs.len());
        for doc in test_docs {
            let prediction = pipeline::score(&model, &doc.tokens);
            let source_doc = self
                .documents
                .iter()
                .find(|d| d.id == doc.id)
                .expect("test document comes from the corpus");
            let actual = if source_doc.title == class_labels.positive {
                Attribution::Positive
            } else {
                Attribution::Negative
            };
            scores.push(ClassificationResult {
                id: doc.id,
                probability: prediction.probability(),
                actual,
            });
        }

        let auc = match evaluation::auc(&scores) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(%err, "AUC not computed");
                None
            }
        };
        let confusion = ConfusionMatrix::from_results(&scores, self.threshold);
        let top_words = ranked_words(&tokenized, self.top_words);

        Ok(AnalysisReport {
            class_labels,
            lambda: LambdaSummary {
                selected: model.lambda(),
                min: model.lambda_min(),
                one_se: model.lambda_1se(),
            },
            coefficients: model.coefficient_table(),
            scores,
            auc,
            confusion,
            top_words,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahash::HashSet;

    fn document(id: u32, title: &str, text: &str) -> Document {
        Document {
            id: DocumentId(id),
            title: title.to_string(),
            text: text.to_string(),
        }
    }

    fn split_of(train: &[u32], test: &[u32]) -> TrainTestSplit {
        TrainTestSplit {
            train_ids: train.iter().map(|&i| DocumentId(i)).collect(),
            test_ids: test.iter().map(|&i| DocumentId(i)).collect(),
        }
    }

    /// The four-document scenario: two "A" lines about Mars, two "B" lines
    /// about the Bennets, no frequency filtering, train on three and hold
    /// out one Mars line.
    #[test]
    fn martian_line_is_attributed_to_the_martian_novel() {
        let documents = vec![
            document(0, "A", "martian invasion mars"),
            document(1, "A", "martian invasion mars"),
            document(2, "B", "elizabeth darcy ball"),
            document(3, "B", "elizabeth darcy ball"),
        ];
        let report = Analysis::new(documents)
            .with_min_count(0)
            .with_split(split_of(&[0, 2, 3], &[1]))
            .with_lambda_rule(LambdaRule::Fixed(0.01))
            .run()
            .unwrap();

        assert_eq!(report.scores.len(), 1);
        let held_out = &report.scores[0];
        assert_eq!(held_out.id, DocumentId(1));
        assert!(
            held_out.probability > 0.5,
            "expected P(A) > 0.5, got {}",
            held_out.probability
        );
        assert_eq!(held_out.actual, Attribution::Positive);
        assert_eq!(report.confusion.true_positive, 1);
        assert_eq!(report.confusion.total(), 1);
        // single-class test set: AUC reported as undefined, not defaulted
        assert!(report.auc.is_none());
    }

    #[test]
    fn out_of_vocabulary_test_line_scores_at_the_intercept() {
        let documents = vec![
            document(0, "A", "martian invasion mars"),
            document(1, "A", "martian heat ray"),
            document(2, "B", "elizabeth darcy ball"),
            document(3, "B", "darcy bennet"),
            document(4, "B", "xylophone"),
        ];
        let report = Analysis::new(documents)
            .with_min_count(0)
            .with_split(split_of(&[0, 1, 2, 3], &[4]))
            .with_lambda_rule(LambdaRule::Fixed(0.01))
            .run()
            .unwrap();

        // "xylophone" never appears in training, so the only signal is the
        // intercept; with balanced classes that sits near 0.5 and well away
        // from the extremes a matched line would reach.
        let held_out = &report.scores[0];
        assert!(held_out.probability > 0.1 && held_out.probability < 0.9);
    }

    #[test]
    fn vocabulary_is_built_before_split_by_design() {
        // Known train/test leakage, preserved for parity with the source
        // analysis: a word occurring only in test documents still earns a
        // vocabulary column.
        let documents = vec![
            document(0, "A", "mars mars"),
            document(1, "B", "ball ball"),
            document(2, "A", "cylinder cylinder"),
        ];
        let tokenized = tokenize(&documents);
        let vocabulary = Vocabulary::build(&tokenized, 1).unwrap();
        // "cylinder" lives only in the would-be test document and survives
        assert!(vocabulary.index_of("cylinder").is_some());
    }

    #[test]
    fn end_to_end_cross_validated_run_produces_a_coherent_report() {
        let mut documents = Vec::new();
        let martian_lines = [
            "the martian machines advanced over mars",
            "a heat ray swept the common at woking",
            "the cylinder opened and the martian emerged",
            "red weed covered the banks of the thames",
        ];
        let austen_lines = [
            "elizabeth danced with darcy at the ball",
            "mrs bennet spoke of nothing but marriage",
            "the party walked the grounds of pemberley",
            "jane smiled at bingley across the room",
        ];
        let mut id = 0;
        for round in 0..5 {
            for line in martian_lines {
                documents.push(document(id, "A", &format!("{line} chapter {round}")));
                id += 1;
            }
            for line in austen_lines {
                documents.push(document(id, "B", &format!("{line} chapter {round}")));
                id += 1;
            }
        }

        let report = Analysis::new(documents)
            .with_min_count(2)
            .with_train_fraction(0.75)
            .with_lambda_rule(LambdaRule::CrossValidatedOneSe { folds: 5 })
            .with_seed(42)
            .run()
            .unwrap();

        assert_eq!(report.scores.len(), 10);
        assert_eq!(report.confusion.total(), report.scores.len());
        if let Some(auc) = report.auc {
            assert!((0.0..=1.0).contains(&auc));
        }
        assert!(report.lambda.one_se.is_some());
        assert!(report.lambda.min.unwrap() <= report.lambda.one_se.unwrap());
        // scores come back in id order
        for pair in report.scores.windows(2) {
            assert!(pair[0].id < pair[1].id);
        }
        // stop words never reach the descriptive table
        assert!(report.top_words.iter().all(|w| w.word != "the"));
    }

    #[test]
    fn corpora_with_one_title_are_rejected() {
        let documents = vec![document(0, "A", "mars"), document(1, "A", "martian")];
        assert!(matches!(
            Analysis::new(documents).with_min_count(0).run(),
            Err(AnalysisError::WrongClassCount { found: 1 })
        ));
    }

    #[test]
    fn degenerate_training_split_aborts_the_run() {
        let documents = vec![
            document(0, "A", "martian invasion mars"),
            document(1, "A", "martian heat ray mars"),
            document(2, "B", "elizabeth darcy ball"),
        ];
        // training split holds only "A" documents
        let err = Analysis::new(documents)
            .with_min_count(0)
            .with_split(split_of(&[0, 1], &[2]))
            .with_lambda_rule(LambdaRule::Fixed(0.01))
            .run();
        assert!(matches!(
            err,
            Err(AnalysisError::Model(ModelError::DegenerateClass { .. }))
        ));
    }

    #[test]
    fn identical_runs_are_reproducible() {
        let documents: Vec<Document> = (0..30)
            .map(|i| {
                if i % 2 == 0 {
                    document(i, "A", "martian mars invasion cylinder heat")
                } else {
                    document(i, "B", "elizabeth darcy ball bennet pemberley")
                }
            })
            .collect();

        let run = || {
            Analysis::new(documents.clone())
                .with_min_count(0)
                .with_seed(7)
                .with_lambda_rule(LambdaRule::CrossValidatedOneSe { folds: 3 })
                .run()
                .unwrap()
        };
        let first = run();
        let second = run();
        assert_eq!(first.lambda.selected, second.lambda.selected);
        assert_eq!(first.auc, second.auc);
        let probs = |r: &AnalysisReport| {
            r.scores.iter().map(|s| s.probability).collect::<Vec<_>>()
        };
        assert_eq!(probs(&first), probs(&second));
    }

    #[test]
    fn explicit_split_ids_partition_the_corpus() {
        let documents = vec![
            document(0, "A", "mars"),
            document(1, "B", "ball"),
            document(2, "A", "martian"),
            document(3, "B", "darcy"),
        ];
        let ids: Vec<DocumentId> = documents.iter().map(|d| d.id).collect();
        let split = split_documents(&ids, 0.5, 9);
        let union: HashSet<DocumentId> = split
            .train_ids
            .union(&split.test_ids)
            .copied()
            .collect();
        assert_eq!(union.len(), 4);
    }
}
