//! Descriptive word-frequency table, the only consumer of the stop-word
//! list. Purely presentational; modeling never sees it.

use ahash::HashMap;
use serde::{Deserialize, Serialize};

use super::stop_words::is_stop_word;
use super::vectorizer::TokenizedDocument;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WordCount {
    pub word: String,
    pub count: usize,
}

/// Rank non-stop-words by total corpus count, descending; ties break
/// alphabetically so the table is deterministic.
pub fn ranked_words(tokenized: &[TokenizedDocument], top: usize) -> Vec<WordCount> {
    let mut counts: HashMap<&str, usize> = HashMap::default();
    for doc in tokenized {
        for token in &doc.tokens {
            if !is_stop_word(token) {
                *counts.entry(token.as_str()).or_insert(0) += 1;
            }
        }
    }

    let mut ranked: Vec<WordCount> = counts
        .into_iter()
        .map(|(word, count)| WordCount {
            word: word.to_string(),
            count,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.word.cmp(&b.word)));
    ranked.truncate(top);
    ranked
}
