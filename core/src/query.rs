//! Boolean retrieval with cosine ranking and sentiment re-ranking.
//!
//! A [`QueryEngine`] owns one immutable index snapshot. Every call works on
//! private per-call state, so a single engine can serve any number of
//! concurrent callers through a shared reference.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::sentiment::lexicon_score;
use crate::tfidf::TfIdf;
use crate::tokenizer::{clean_terms_with, TokenizerOptions};
use crate::{CorpusStats, InvertedIndex};

/// Number of top results re-ordered by document sentiment.
pub const RERANK_WINDOW: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    /// Documents containing every query term.
    And,
    /// Documents containing at least one query term.
    Or,
}

impl FromStr for QueryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "and" => Ok(Self::And),
            "or" => Ok(Self::Or),
            other => Err(format!("unknown query mode '{other}', expected 'and' or 'or'")),
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => f.write_str("and"),
            Self::Or => f.write_str("or"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub url: String,
    pub cosine_similarity: f64,
    /// Aggregate sentiment of the whole document.
    pub sentiment: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResults {
    pub kind: QueryKind,
    pub raw_text: String,
    pub cleaned_terms: Vec<String>,
    /// Lexicon score of the raw query text.
    pub sentiment: f64,
    pub hits: Vec<SearchHit>,
}

impl QueryResults {
    pub fn is_empty(&self) -> bool { self.hits.is_empty() }
}

pub trait Query {
    fn kind(&self) -> QueryKind;
    fn execute(&self, text: &str) -> QueryResults;
}

pub struct AndQuery<'a> {
    engine: &'a QueryEngine,
}

pub struct OrQuery<'a> {
    engine: &'a QueryEngine,
}

impl Query for AndQuery<'_> {
    fn kind(&self) -> QueryKind { QueryKind::And }

    fn execute(&self, text: &str) -> QueryResults {
        self.engine.run(self.kind(), text)
    }
}

impl Query for OrQuery<'_> {
    fn kind(&self) -> QueryKind { QueryKind::Or }

    fn execute(&self, text: &str) -> QueryResults {
        self.engine.run(self.kind(), text)
    }
}

pub struct QueryEngine {
    index: InvertedIndex,
    stats: CorpusStats,
    options: TokenizerOptions,
}

impl QueryEngine {
    pub fn new(index: InvertedIndex, stats: CorpusStats) -> Self {
        Self { index, stats, options: TokenizerOptions::default() }
    }

    /// Tokenizer settings applied to query text; must match how the indexed
    /// content was tokenized.
    pub fn with_options(mut self, options: TokenizerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn index(&self) -> &InvertedIndex { &self.index }

    pub fn stats(&self) -> &CorpusStats { &self.stats }

    pub fn and_query(&self) -> AndQuery<'_> { AndQuery { engine: self } }

    pub fn or_query(&self) -> OrQuery<'_> { OrQuery { engine: self } }

    pub fn query(&self, kind: QueryKind) -> Box<dyn Query + '_> {
        match kind {
            QueryKind::And => Box::new(self.and_query()),
            QueryKind::Or => Box::new(self.or_query()),
        }
    }

    pub fn execute(&self, kind: QueryKind, text: &str) -> QueryResults {
        self.query(kind).execute(text)
    }

    pub fn execute_and(&self, text: &str) -> QueryResults { self.and_query().execute(text) }

    pub fn execute_or(&self, text: &str) -> QueryResults { self.or_query().execute(text) }

    fn run(&self, kind: QueryKind, text: &str) -> QueryResults {
        let cleaned_terms = clean_terms_with(text, &self.options);

        // Distinct terms in first-occurrence order, with their query counts.
        let mut terms: Vec<(&str, usize)> = Vec::new();
        for term in &cleaned_terms {
            match terms.iter_mut().find(|(t, _)| *t == term.as_str()) {
                Some((_, count)) => *count += 1,
                None => terms.push((term.as_str(), 1)),
            }
        }

        let url_sets: Vec<BTreeSet<&str>> = terms
            .iter()
            .map(|(term, _)| {
                self.index
                    .postings(term)
                    .map(|p| p.keys().map(String::as_str).collect::<BTreeSet<_>>())
                    .unwrap_or_default()
            })
            .collect();
        let matched = match kind {
            QueryKind::And => intersect(url_sets),
            QueryKind::Or => union(url_sets),
        };

        let calc = TfIdf::new(&self.index, &self.stats);
        let query_vec: Vec<f64> = terms
            .iter()
            .map(|(term, count)| *count as f64 * calc.idf_weight(term))
            .collect();

        let mut hits: Vec<SearchHit> = matched
            .into_iter()
            .map(|url| {
                let doc_vec: Vec<f64> = terms.iter().map(|(term, _)| calc.tf_idf(term, url)).collect();
                SearchHit {
                    url: url.to_string(),
                    cosine_similarity: cosine_similarity(&query_vec, &doc_vec),
                    sentiment: self.stats.document_sentiment(url),
                }
            })
            .collect();
        hits.sort_by(|a, b| b.cosine_similarity.total_cmp(&a.cosine_similarity));

        let sentiment = lexicon_score(text);
        rerank_by_sentiment(&mut hits, sentiment);
        tracing::debug!(%kind, query = text, terms = terms.len(), hits = hits.len(), sentiment, "query executed");

        QueryResults { kind, raw_text: text.to_string(), cleaned_terms, sentiment, hits }
    }
}

fn intersect(sets: Vec<BTreeSet<&str>>) -> BTreeSet<&str> {
    let mut sets = sets.into_iter();
    let Some(first) = sets.next() else { return BTreeSet::new() };
    sets.fold(first, |acc, set| acc.intersection(&set).copied().collect())
}

fn union(sets: Vec<BTreeSet<&str>>) -> BTreeSet<&str> {
    sets.into_iter().flatten().collect()
}

/// Cosine of the angle between `a` and `b`; 0.0 when either has zero norm.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Re-order the first [`RERANK_WINDOW`] hits by document sentiment, following
/// the polarity of the query: descending when positive, ascending when
/// negative, untouched when neutral. The sort is stable.
pub fn rerank_by_sentiment(hits: &mut [SearchHit], query_sentiment: f64) {
    let window = hits.len().min(RERANK_WINDOW);
    let head = &mut hits[..window];
    if query_sentiment > 0.0 {
        head.sort_by(|a, b| b.sentiment.total_cmp(&a.sentiment));
    } else if query_sentiment < 0.0 {
        head.sort_by(|a, b| a.sentiment.total_cmp(&b.sentiment));
    }
}
