mod frequency;
mod stop_words;
mod vectorizer;

pub use frequency::{ranked_words, WordCount};
pub use stop_words::is_stop_word;
pub use vectorizer::{
    tokenize, tokenize_text, CountMatrix, TokenizedDocument, VectorizeError, Vocabulary,
};
