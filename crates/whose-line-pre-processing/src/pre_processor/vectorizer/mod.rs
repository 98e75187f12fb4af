mod count_matrix;
mod tokenizer;
mod vocabulary;

pub use count_matrix::CountMatrix;
pub use tokenizer::{tokenize, tokenize_text, TokenizedDocument};
pub use vocabulary::{VectorizeError, Vocabulary};
