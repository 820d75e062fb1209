//! Sentiment-aware TF-IDF search over a crawled document set.
//!
//! Pipeline: [`collect`] corpus statistics, [`build`] the inverted index,
//! persist both with [`persist`], then answer AND/OR queries through a
//! [`QueryEngine`].

pub mod builder;
pub mod error;
pub mod index;
pub mod persist;
pub mod query;
pub mod sentiment;
pub mod stats;
pub mod tfidf;
pub mod tokenizer;

pub use builder::{build, IndexBuilder};
pub use error::{Result, SearchError};
pub use index::{Document, IndexEntry, InvertedIndex, Posting};
pub use query::{AndQuery, OrQuery, Query, QueryEngine, QueryKind, QueryResults, SearchHit, RERANK_WINDOW};
pub use sentiment::lexicon_score;
pub use stats::{collect, CorpusStats, DocumentStats};
pub use tfidf::TfIdf;
pub use tokenizer::{clean_terms, clean_terms_with, TokenizerOptions};
