use ahash::{HashMap, HashSet};
use sprs::CsMat;
use tracing::debug;

use super::tokenizer::TokenizedDocument;
use super::vocabulary::{VectorizeError, Vocabulary};
use crate::corpus::DocumentId;

/// Sparse document-term count matrix over the training split.
///
/// Rows are training documents in ascending [`DocumentId`] order, columns are
/// vocabulary terms in vocabulary order, cells are raw occurrence counts.
/// The row keys travel with the matrix in `row_ids`; every consumer aligns
/// by key, never by the position a document happened to arrive in.
#[derive(Clone, Debug)]
pub struct CountMatrix {
    matrix: CsMat<f64>,
    row_ids: Vec<DocumentId>,
}

impl CountMatrix {
    /// Aggregate (document, word) counts for the training documents and
    /// assemble the CSR matrix.
    ///
    /// Documents whose tokens all fell outside the vocabulary contribute no
    /// row: they are dropped from both the matrix and `row_ids`, so every
    /// stored row has at least one nonzero entry.
    pub fn build(
        tokenized: &[TokenizedDocument],
        vocabulary: &Vocabulary,
        train_ids: &HashSet<DocumentId>,
    ) -> Result<Self, VectorizeError> {
        if vocabulary.is_empty() {
            return Err(VectorizeError::EmptyVocabulary {
                min_count: vocabulary.min_count(),
            });
        }

        let mut train_docs: Vec<&TokenizedDocument> = tokenized
            .iter()
            .filter(|doc| train_ids.contains(&doc.id))
            .collect();
        train_docs.sort_by_key(|doc| doc.id);

        // Build CSR format directly
        let mut indptr = Vec::with_capacity(train_docs.len() + 1);
        let mut indices = Vec::new();
        let mut data = Vec::new();
        let mut row_ids = Vec::with_capacity(train_docs.len());
        let mut dropped = 0usize;

        indptr.push(0);
        for doc in train_docs {
            let mut row_counts: HashMap<usize, f64> = HashMap::default();
            for token in &doc.tokens {
                if let Some(col_idx) = vocabulary.index_of(token) {
                    *row_counts.entry(col_idx).or_insert(0.0) += 1.0;
                }
            }
            if row_counts.is_empty() {
                dropped += 1;
                continue;
            }

            let mut row_entries: Vec<(usize, f64)> = row_counts.into_iter().collect();
            row_entries.sort_by_key(|(col_idx, _)| *col_idx);
            for (col_idx, count) in row_entries {
                indices.push(col_idx);
                data.push(count);
            }
            indptr.push(indices.len());
            row_ids.push(doc.id);
        }

        if row_ids.is_empty() {
            return Err(VectorizeError::NoTrainingRows);
        }

        debug!(
            rows = row_ids.len(),
            dropped,
            non_zero_entries = data.len(),
            "Count matrix assembled"
        );
        let matrix = CsMat::new((row_ids.len(), vocabulary.len()), indptr, indices, data);
        Ok(Self { matrix, row_ids })
    }

    pub fn matrix(&self) -> &CsMat<f64> {
        &self.matrix
    }

    /// Document ids keying the matrix rows, in row order.
    pub fn row_ids(&self) -> &[DocumentId] {
        &self.row_ids
    }

    pub fn rows(&self) -> usize {
        self.matrix.rows()
    }

    pub fn cols(&self) -> usize {
        self.matrix.cols()
    }
}
