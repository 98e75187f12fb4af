use ahash::HashMap;
use dashmap::DashMap;
use rayon::prelude::*;
use tracing::debug;

use super::tokenizer::TokenizedDocument;

#[derive(thiserror::Error, Debug)]
pub enum VectorizeError {
    /// The frequency filter removed every word.
    #[error("minimum count {min_count} leaves an empty vocabulary")]
    EmptyVocabulary { min_count: usize },

    /// Every training document was dropped for having no vocabulary words.
    #[error("no training document contains a vocabulary word")]
    NoTrainingRows,
}

/// The set of words surviving the corpus-wide frequency filter, with a
/// deterministic column index per word (lexicographic order).
///
/// The vocabulary is built over the *entire* corpus, before any train/test
/// split. That mirrors the source analysis this pipeline reproduces, and it
/// is a known (deliberate) leakage of test-set word statistics into the
/// feature space.
#[derive(Clone, Debug)]
pub struct Vocabulary {
    index: HashMap<String, usize>,
    terms: Vec<String>,
    min_count: usize,
}

impl Vocabulary {
    /// Count word occurrences across the whole corpus and keep every word
    /// whose total count is strictly greater than `min_count`.
    pub fn build(
        tokenized: &[TokenizedDocument],
        min_count: usize,
    ) -> Result<Self, VectorizeError> {
        debug!(num_docs = tokenized.len(), min_count, "Building vocabulary");
        let counts: DashMap<String, usize, ahash::RandomState> =
            DashMap::with_hasher(ahash::RandomState::default());

        tokenized.par_iter().for_each(|doc| {
            for token in &doc.tokens {
                counts
                    .entry(token.clone())
                    .and_modify(|c| *c += 1)
                    .or_insert(1usize);
            }
        });

        let total_words = counts.len();
        let mut terms: Vec<String> = counts
            .into_iter()
            .filter(|(_, count)| *count > min_count)
            .map(|(word, _)| word)
            .collect();
        debug!(
            original_size = total_words,
            filtered_size = terms.len(),
            "Vocabulary filtered by minimum count"
        );

        if terms.is_empty() {
            return Err(VectorizeError::EmptyVocabulary { min_count });
        }

        terms.sort();
        let index = terms
            .iter()
            .enumerate()
            .map(|(idx, term)| (term.clone(), idx))
            .collect::<HashMap<String, usize>>();

        Ok(Self {
            index,
            terms,
            min_count,
        })
    }

    pub fn index_of(&self, term: &str) -> Option<usize> {
        self.index.get(term).copied()
    }

    pub fn term(&self, index: usize) -> &str {
        &self.terms[index]
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn min_count(&self) -> usize {
        self.min_count
    }
}
