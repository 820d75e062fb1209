//! Per-document and corpus-wide statistics.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Result, SearchError};
use crate::persist::is_encodable;
use crate::sentiment::lexicon_score;
use crate::Document;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentStats {
    pub token_count: u64,
    pub sentiment_total: f64,
}

/// Corpus-wide aggregates plus one [`DocumentStats`] per distinct URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusStats {
    /// N; always equal to `documents.len()` and at least 1.
    pub document_count: usize,
    pub total_tokens: u64,
    pub total_sentiment: f64,
    pub avg_tokens: f64,
    pub avg_sentiment: f64,
    pub documents: BTreeMap<String, DocumentStats>,
}

impl CorpusStats {
    pub fn document(&self, url: &str) -> Option<&DocumentStats> { self.documents.get(url) }

    /// Sentiment total of `url`, 0.0 when the URL is unknown.
    pub fn document_sentiment(&self, url: &str) -> f64 {
        self.documents.get(url).map_or(0.0, |d| d.sentiment_total)
    }
}

/// Compute statistics for `documents`.
///
/// Documents sharing a URL are merged into one entry so that the document
/// count matches the number of distinct postings keys the index can hold.
/// URLs must be encodable; a URL the text format cannot hold is rejected here
/// rather than producing a snapshot that fails to load.
pub fn collect(documents: &[Document]) -> Result<CorpusStats> {
    if documents.is_empty() {
        return Err(SearchError::EmptyCorpus);
    }
    if let Some(doc) = documents.iter().find(|d| !is_encodable(&d.url)) {
        return Err(SearchError::UnencodableUrl(doc.url.clone()));
    }

    let mut per_url: BTreeMap<String, DocumentStats> = BTreeMap::new();
    for doc in documents {
        let stats = per_url.entry(doc.url.clone()).or_default();
        stats.token_count += doc.content.len() as u64;
        stats.sentiment_total += lexicon_score(&doc.content.join(" "));
    }

    let document_count = per_url.len();
    let total_tokens: u64 = per_url.values().map(|d| d.token_count).sum();
    let total_sentiment: f64 = per_url.values().map(|d| d.sentiment_total).sum();
    tracing::info!(document_count, total_tokens, total_sentiment, "collected corpus statistics");

    Ok(CorpusStats {
        document_count,
        total_tokens,
        total_sentiment,
        avg_tokens: total_tokens as f64 / document_count as f64,
        avg_sentiment: total_sentiment / document_count as f64,
        documents: per_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(url: &str, words: &[&str]) -> Document {
        Document::new(url, words.iter().map(|w| w.to_string()).collect())
    }

    #[test]
    fn empty_corpus_is_rejected() {
        assert!(matches!(collect(&[]), Err(SearchError::EmptyCorpus)));
    }

    #[test]
    fn aggregates_counts_and_sentiment() {
        let stats = collect(&[doc("a", &["happy", "day"]), doc("b", &["sad", "day", "again"])]).unwrap();
        assert_eq!(stats.document_count, 2);
        assert_eq!(stats.total_tokens, 5);
        assert_eq!(stats.avg_tokens, 2.5);
        assert_eq!(stats.document("a").unwrap().sentiment_total, 3.0);
        assert_eq!(stats.document("b").unwrap().sentiment_total, -2.0);
        assert_eq!(stats.total_sentiment, 1.0);
        assert_eq!(stats.avg_sentiment, 0.5);
    }

    #[test]
    fn duplicate_urls_are_merged() {
        let stats = collect(&[doc("a", &["good"]), doc("a", &["bad", "day"])]).unwrap();
        assert_eq!(stats.document_count, 1);
        assert_eq!(stats.documents.len(), 1);
        let a = stats.document("a").unwrap();
        assert_eq!(a.token_count, 3);
        assert_eq!(a.sentiment_total, 0.0);
    }

    #[test]
    fn whitespace_or_empty_urls_are_rejected() {
        let err = collect(&[doc("https://ex.com/a b", &["happy"]), doc("https://ex.com/c", &["day"])]).unwrap_err();
        assert!(matches!(err, SearchError::UnencodableUrl(ref url) if url == "https://ex.com/a b"));
        assert!(matches!(collect(&[doc("", &["day"])]), Err(SearchError::UnencodableUrl(_))));
    }

    #[test]
    fn unknown_url_has_neutral_sentiment() {
        let stats = collect(&[doc("a", &["happy"])]).unwrap();
        assert_eq!(stats.document_sentiment("zzz"), 0.0);
    }
}
