use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::BTreeMap;

/// One fetched page: its URL and the terms extracted from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub url: String,
    pub content: Vec<String>,
}

impl Document {
    pub fn new(url: impl Into<String>, content: Vec<String>) -> Self {
        Self { url: url.into(), content }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub term_frequency: u32,
    pub tf_idf: f64,
}

/// Everything the index knows about one term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Occurrences across the whole corpus (cft).
    pub corpus_term_frequency: u64,
    /// Number of documents containing the term (dft); equals `postings.len()`.
    pub document_frequency: usize,
    pub idf: f64,
    /// Lexicon score of the bare term.
    pub sentiment: f64,
    /// url -> posting, ordered by url.
    pub postings: BTreeMap<String, Posting>,
}

/// Inverted index: term -> entry, ordered by term.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvertedIndex {
    terms: BTreeMap<String, IndexEntry>,
}

impl InvertedIndex {
    pub fn new() -> Self { Self::default() }

    pub fn get(&self, term: &str) -> Option<&IndexEntry> { self.terms.get(term) }

    pub fn contains(&self, term: &str) -> bool { self.terms.contains_key(term) }

    pub fn len(&self) -> usize { self.terms.len() }

    pub fn is_empty(&self) -> bool { self.terms.is_empty() }

    /// Entries in ascending term order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, IndexEntry> { self.terms.iter() }

    /// Postings of `term`, or `None` when the term is unknown.
    pub fn postings(&self, term: &str) -> Option<&BTreeMap<String, Posting>> {
        self.terms.get(term).map(|e| &e.postings)
    }

    pub(crate) fn entry(&mut self, term: String) -> btree_map::Entry<'_, String, IndexEntry> {
        self.terms.entry(term)
    }

    pub(crate) fn entries_mut(&mut self) -> btree_map::IterMut<'_, String, IndexEntry> {
        self.terms.iter_mut()
    }
}

impl FromIterator<(String, IndexEntry)> for InvertedIndex {
    fn from_iter<I: IntoIterator<Item = (String, IndexEntry)>>(iter: I) -> Self {
        Self { terms: iter.into_iter().collect() }
    }
}

impl<'a> IntoIterator for &'a InvertedIndex {
    type Item = (&'a String, &'a IndexEntry);
    type IntoIter = btree_map::Iter<'a, String, IndexEntry>;

    fn into_iter(self) -> Self::IntoIter { self.terms.iter() }
}
