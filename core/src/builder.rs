//! Two-pass inverted index construction.
//!
//! Document frequencies are only final once every document has been added,
//! so weights are computed in [`IndexBuilder::finish`] and never while
//! accumulating.

use std::collections::BTreeMap;

use crate::index::{Document, IndexEntry, InvertedIndex, Posting};
use crate::sentiment::lexicon_score;
use crate::stats::CorpusStats;
use crate::tfidf::idf;

pub struct IndexBuilder {
    num_docs: usize,
    index: InvertedIndex,
}

impl IndexBuilder {
    pub fn new(stats: &CorpusStats) -> Self {
        Self { num_docs: stats.document_count, index: InvertedIndex::new() }
    }

    /// Accumulation pass: counts only, no weights.
    pub fn add_document(&mut self, doc: &Document) {
        for term in &doc.content {
            let entry = self.index.entry(term.clone()).or_insert_with(|| IndexEntry {
                corpus_term_frequency: 0,
                document_frequency: 0,
                idf: 0.0,
                sentiment: lexicon_score(term),
                postings: BTreeMap::new(),
            });
            entry.corpus_term_frequency += 1;
            entry
                .postings
                .entry(doc.url.clone())
                .or_insert(Posting { term_frequency: 0, tf_idf: 0.0 })
                .term_frequency += 1;
        }
    }

    /// Weighting pass: fixes dft, idf and every posting's tf-idf.
    pub fn finish(mut self) -> InvertedIndex {
        let n = self.num_docs;
        for (_, entry) in self.index.entries_mut() {
            entry.document_frequency = entry.postings.len();
            entry.idf = idf(n, entry.document_frequency);
            for posting in entry.postings.values_mut() {
                posting.tf_idf = posting.term_frequency as f64 * entry.idf;
            }
        }
        tracing::info!(num_docs = n, num_terms = self.index.len(), "index built");
        self.index
    }
}

pub fn build(documents: &[Document], stats: &CorpusStats) -> InvertedIndex {
    let mut builder = IndexBuilder::new(stats);
    for doc in documents {
        builder.add_document(doc);
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect;

    fn docs() -> Vec<Document> {
        vec![
            Document::new("a", vec!["happy".into(), "day".into()]),
            Document::new("b", vec!["sad".into(), "day".into()]),
        ]
    }

    #[test]
    fn two_document_example() {
        let docs = docs();
        let stats = collect(&docs).unwrap();
        let index = build(&docs, &stats);

        let day = index.get("day").unwrap();
        assert_eq!(day.corpus_term_frequency, 2);
        assert_eq!(day.document_frequency, 2);
        assert_eq!(day.idf, 0.0);
        assert!(day.postings.values().all(|p| p.tf_idf == 0.0));

        let happy = index.get("happy").unwrap();
        assert_eq!(happy.document_frequency, 1);
        assert_eq!(happy.idf, 2f64.log10());
        assert_eq!(happy.sentiment, 3.0);
        let posting = happy.postings.get("a").unwrap();
        assert_eq!(posting.term_frequency, 1);
        assert_eq!(posting.tf_idf, 2f64.log10());
    }

    #[test]
    fn weights_use_final_document_frequency() {
        // "day" appears in the first document scanned; an eager idf would
        // have used dft = 1 instead of the final 3.
        let docs = vec![
            Document::new("a", vec!["day".into(), "day".into()]),
            Document::new("b", vec!["day".into()]),
            Document::new("c", vec!["day".into(), "night".into()]),
        ];
        let stats = collect(&docs).unwrap();
        let index = build(&docs, &stats);
        let day = index.get("day").unwrap();
        assert_eq!(day.document_frequency, 3);
        assert_eq!(day.corpus_term_frequency, 4);
        assert_eq!(day.idf, 0.0);
        assert_eq!(day.postings["a"].term_frequency, 2);
        assert_eq!(day.postings["a"].tf_idf, 0.0);
    }

    #[test]
    fn invariants_hold_for_every_entry() {
        let docs = vec![
            Document::new("a", vec!["x".into(), "y".into(), "x".into()]),
            Document::new("b", vec!["y".into(), "z".into()]),
            Document::new("c", vec!["z".into(), "z".into(), "w".into()]),
        ];
        let stats = collect(&docs).unwrap();
        let index = build(&docs, &stats);
        for (_, entry) in &index {
            assert_eq!(entry.document_frequency, entry.postings.len());
            assert_eq!(entry.idf, idf(3, entry.document_frequency));
            let tf_sum: u64 = entry.postings.values().map(|p| p.term_frequency as u64).sum();
            assert_eq!(entry.corpus_term_frequency, tf_sum);
            for p in entry.postings.values() {
                assert_eq!(p.tf_idf, p.term_frequency as f64 * entry.idf);
            }
        }
    }

    #[test]
    fn empty_documents_yield_empty_index() {
        let docs = vec![Document::new("a", vec![])];
        let stats = collect(&docs).unwrap();
        assert!(build(&docs, &stats).is_empty());
    }
}
