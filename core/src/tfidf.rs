//! TF-IDF arithmetic over an index and its corpus size.
//!
//! Unknown terms and absent postings resolve to zero rather than errors, so
//! the same calculator serves index weighting and live query scoring.

use crate::{CorpusStats, InvertedIndex};

/// `log10(n / dft)`, or 0.0 when the term occurs nowhere.
#[inline]
pub fn idf(n: usize, dft: usize) -> f64 {
    if dft == 0 {
        return 0.0;
    }
    (n as f64 / dft as f64).log10()
}

#[derive(Clone, Copy)]
pub struct TfIdf<'a> {
    index: &'a InvertedIndex,
    n: usize,
}

impl<'a> TfIdf<'a> {
    pub fn new(index: &'a InvertedIndex, stats: &CorpusStats) -> Self {
        Self { index, n: stats.document_count }
    }

    pub fn document_frequency(&self, term: &str) -> usize {
        self.index.postings(term).map_or(0, |p| p.len())
    }

    pub fn term_frequency_in_document(&self, term: &str, url: &str) -> u32 {
        self.index
            .postings(term)
            .and_then(|p| p.get(url))
            .map_or(0, |p| p.term_frequency)
    }

    pub fn idf_weight(&self, term: &str) -> f64 {
        idf(self.n, self.document_frequency(term))
    }

    pub fn tf_idf(&self, term: &str, url: &str) -> f64 {
        self.term_frequency_in_document(term, url) as f64 * self.idf_weight(term)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{build, collect, Document};

    fn corpus() -> (InvertedIndex, CorpusStats) {
        let docs = vec![
            Document::new("a", vec!["happy".into(), "day".into(), "happy".into()]),
            Document::new("b", vec!["sad".into(), "day".into()]),
        ];
        let stats = collect(&docs).unwrap();
        (build(&docs, &stats), stats)
    }

    #[test]
    fn idf_of_zero_df_is_zero() {
        assert_eq!(idf(10, 0), 0.0);
        assert_eq!(idf(10, 10), 0.0);
        assert!((idf(100, 1) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn lookups_resolve_misses_to_zero() {
        let (index, stats) = corpus();
        let calc = TfIdf::new(&index, &stats);
        assert_eq!(calc.document_frequency("nope"), 0);
        assert_eq!(calc.term_frequency_in_document("happy", "b"), 0);
        assert_eq!(calc.term_frequency_in_document("nope", "a"), 0);
        assert_eq!(calc.idf_weight("nope"), 0.0);
        assert_eq!(calc.tf_idf("nope", "a"), 0.0);
    }

    #[test]
    fn weights_follow_log10() {
        let (index, stats) = corpus();
        let calc = TfIdf::new(&index, &stats);
        assert_eq!(calc.document_frequency("day"), 2);
        assert_eq!(calc.idf_weight("day"), 0.0);
        assert_eq!(calc.term_frequency_in_document("happy", "a"), 2);
        assert_eq!(calc.idf_weight("happy"), 2f64.log10());
        assert_eq!(calc.tf_idf("happy", "a"), 2.0 * 2f64.log10());
    }
}
