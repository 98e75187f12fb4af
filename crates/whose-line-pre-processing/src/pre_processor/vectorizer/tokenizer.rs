use std::borrow::Cow;

use indicatif::{ParallelProgressIterator, ProgressBar, ProgressIterator, ProgressStyle};
use rayon::prelude::*;
use tracing::debug;

use crate::corpus::{Document, DocumentId};

/// Minimum number of documents to consider parallelization
const MIN_DOCS_FOR_PARALLEL: usize = 100;

/// Minimum total character count to consider parallelization
const MIN_CHARS_FOR_PARALLEL: usize = 10_000;

/// A document reduced to its word tokens, with the document key carried
/// alongside so later joins never rely on positional order.
#[derive(Clone, Debug)]
pub struct TokenizedDocument {
    pub id: DocumentId,
    pub tokens: Vec<String>,
}

fn progress_bar_setup(len: usize, message: impl Into<Cow<'static, str>>) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb.set_message(message);
    pb
}

/// Split one line of text into lowercased word tokens.
///
/// A token is a maximal run of alphanumeric characters and apostrophes;
/// surrounding apostrophes are trimmed so quoted words ("'tis") normalize the
/// same as bare ones, while contractions ("don't") survive intact.
pub fn tokenize_text(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    fn flush(current: &mut String, tokens: &mut Vec<String>) {
        let word = current.trim_matches('\'');
        if !word.is_empty() {
            tokens.push(word.to_string());
        }
        current.clear();
    }

    for ch in text.chars() {
        if ch.is_alphanumeric() {
            current.extend(ch.to_lowercase());
        } else if ch == '\'' {
            current.push(ch);
        } else {
            flush(&mut current, &mut tokens);
        }
    }
    flush(&mut current, &mut tokens);
    tokens
}

fn tokenize_docs_par(docs: &[Document]) -> Vec<TokenizedDocument> {
    debug!(num_docs = docs.len(), "Using parallel tokenization");
    let pb = progress_bar_setup(docs.len(), "Tokenizing documents in parallel");
    let result = docs
        .par_iter()
        .progress_with(pb.clone())
        .map(|doc| TokenizedDocument {
            id: doc.id,
            tokens: tokenize_text(&doc.text),
        })
        .collect();
    pb.finish_with_message("Parallel tokenization complete");
    result
}

fn tokenize_docs(docs: &[Document]) -> Vec<TokenizedDocument> {
    debug!(num_docs = docs.len(), "Using sequential tokenization");
    let pb = progress_bar_setup(docs.len(), "Tokenizing documents");
    let result = docs
        .iter()
        .progress_with(pb.clone())
        .map(|doc| TokenizedDocument {
            id: doc.id,
            tokens: tokenize_text(&doc.text),
        })
        .collect();
    pb.finish_with_message("Tokenization complete");
    result
}

/// Determine if parallel processing should be used based on workload
/// characteristics: many documents, or a large total character count.
#[inline]
fn should_use_parallel(docs: &[Document]) -> bool {
    let num_docs = docs.len();

    if num_docs >= MIN_DOCS_FOR_PARALLEL {
        return true;
    }

    // For fewer documents, check total workload. Sample the first few to
    // estimate average length if there are many.
    let total_chars: usize = if num_docs > 20 {
        let sample_chars: usize = docs.iter().take(20).map(|d| d.text.len()).sum();
        (sample_chars * num_docs) / 20
    } else {
        docs.iter().map(|d| d.text.len()).sum()
    };

    total_chars >= MIN_CHARS_FOR_PARALLEL
}

/// Tokenize every document, in parallel when the workload justifies it.
/// Output order matches input order either way.
pub fn tokenize(docs: &[Document]) -> Vec<TokenizedDocument> {
    if should_use_parallel(docs) {
        tokenize_docs_par(docs)
    } else {
        tokenize_docs(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_strips_punctuation() {
        assert_eq!(
            tokenize_text("No one would have believed, in the LAST years"),
            vec!["no", "one", "would", "have", "believed", "in", "the", "last", "years"]
        );
    }

    #[test]
    fn keeps_interior_apostrophes_and_trims_quoting_ones() {
        assert_eq!(
            tokenize_text("'It don't matter,'"),
            vec!["it", "don't", "matter"]
        );
    }

    #[test]
    fn blank_text_yields_no_tokens() {
        assert!(tokenize_text("  --- ").is_empty());
    }

    #[test]
    fn one_entry_per_occurrence() {
        assert_eq!(tokenize_text("mars, mars!"), vec!["mars", "mars"]);
    }

    #[test]
    fn tokenized_documents_keep_their_ids() {
        let docs = vec![
            Document {
                id: DocumentId(7),
                title: "A".to_string(),
                text: "martian invasion".to_string(),
            },
            Document {
                id: DocumentId(9),
                title: "B".to_string(),
                text: "elizabeth darcy".to_string(),
            },
        ];
        let tokenized = tokenize(&docs);
        assert_eq!(tokenized[0].id, DocumentId(7));
        assert_eq!(tokenized[1].tokens, vec!["elizabeth", "darcy"]);
    }
}
