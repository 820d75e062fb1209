//! Error types for index construction and persisted-state loading.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors surfaced by the search core.
///
/// Lookup misses and zero-norm vectors are not errors; they resolve to zero
/// values where they occur.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The corpus has no documents, so every average is undefined.
    #[error("cannot build corpus statistics from an empty document set")]
    EmptyCorpus,

    /// A persisted index or stats file could not be parsed.
    #[error("malformed persisted state in {}:{line}: {reason}; rebuild the index", file.display())]
    MalformedPersistedState {
        /// File being decoded.
        file: PathBuf,
        /// 1-based line number.
        line: usize,
        /// What was wrong with the line.
        reason: String,
    },

    /// A document URL is empty or contains whitespace, so the persisted
    /// text format cannot represent it.
    #[error("document url {0:?} cannot be persisted (empty or contains whitespace)")]
    UnencodableUrl(String),

    /// A persisted file required for skip-crawl mode does not exist.
    #[error("persisted state not found at {}; run `indexer build` first", .0.display())]
    MissingPersistedState(PathBuf),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl SearchError {
    pub(crate) fn malformed(file: impl Into<PathBuf>, line: usize, reason: impl Into<String>) -> Self {
        Self::MalformedPersistedState { file: file.into(), line, reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;
