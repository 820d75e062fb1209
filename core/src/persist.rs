//! Flat-text persistence for the index and the corpus statistics.
//!
//! `index.txt` holds one line per term, sorted by term:
//! `<term> <cft> <dft> <idf> <sentiment> (<url> <tf> <tf-idf>)+`
//!
//! `url_stats.txt` holds one `<url> <token_count> <sentiment_total>` line per
//! document followed by
//! `SUMMARY: <document_count> <total_tokens> <avg_tokens> <total_sentiment> <avg_sentiment>`.
//!
//! `tokenizer.txt` records how the feed was tokenized, as `remove_stopwords=<bool>`
//! and `stem=<bool>` lines, so query text is cleaned the same way.
//!
//! Floats use Rust's shortest round-trip formatting, so decoding yields the
//! exact values that were encoded.

use std::collections::BTreeMap;
use std::fs::{create_dir_all, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Result, SearchError};
use crate::{CorpusStats, DocumentStats, IndexEntry, InvertedIndex, Posting, QueryEngine, TokenizerOptions};

const SUMMARY_PREFIX: &str = "SUMMARY:";

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn index(&self) -> PathBuf { self.root.join("index.txt") }
    pub fn stats(&self) -> PathBuf { self.root.join("url_stats.txt") }
    pub fn options(&self) -> PathBuf { self.root.join("tokenizer.txt") }
}

/// Outcome of a write: how many lines made it out and which terms were
/// skipped because the text encoding cannot represent them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub lines_written: usize,
    pub skipped: Vec<String>,
}

impl WriteReport {
    pub fn skipped_count(&self) -> usize { self.skipped.len() }

    fn warn_if_skipped(&self, what: &str, path: &Path) {
        if !self.skipped.is_empty() {
            tracing::warn!(
                path = %path.display(),
                skipped = ?self.skipped,
                "{} {what} skipped due to encoding",
                self.skipped.len()
            );
        }
    }
}

/// Whether `field` survives the whitespace-delimited encoding intact.
pub fn is_encodable(field: &str) -> bool {
    !field.is_empty() && !field.chars().any(char::is_whitespace)
}

/// Unencodable terms are skipped and reported. An unencodable posting URL is
/// an error: dropping it would leave other documents' postings behind.
pub fn encode_index<W: Write>(index: &InvertedIndex, out: &mut W) -> Result<WriteReport> {
    let mut report = WriteReport::default();
    for (term, entry) in index {
        if let Some(url) = entry.postings.keys().find(|url| !is_encodable(url)) {
            return Err(SearchError::UnencodableUrl(url.clone()));
        }
        if !is_encodable(term) {
            report.skipped.push(term.clone());
            continue;
        }
        write!(
            out,
            "{} {} {} {} {}",
            term, entry.corpus_term_frequency, entry.document_frequency, entry.idf, entry.sentiment
        )?;
        for (url, posting) in &entry.postings {
            write!(out, " {} {} {}", url, posting.term_frequency, posting.tf_idf)?;
        }
        writeln!(out)?;
        report.lines_written += 1;
    }
    Ok(report)
}

/// Parse an index encoding. `origin` only labels error messages.
pub fn decode_index<R: BufRead>(input: R, origin: &Path) -> Result<InvertedIndex> {
    let mut terms: BTreeMap<String, IndexEntry> = BTreeMap::new();
    for (i, line) in input.lines().enumerate() {
        let line_no = i + 1;
        let line = line?;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() { continue; }
        if fields.len() < 8 || (fields.len() - 5) % 3 != 0 {
            return Err(SearchError::malformed(origin, line_no, format!("expected 5 + 3k fields (k >= 1), found {}", fields.len())));
        }
        let term = fields[0].to_string();
        let mut entry = IndexEntry {
            corpus_term_frequency: parse_field(fields[1], "cft", origin, line_no)?,
            document_frequency: parse_field(fields[2], "dft", origin, line_no)?,
            idf: parse_field(fields[3], "idf", origin, line_no)?,
            sentiment: parse_field(fields[4], "sentiment", origin, line_no)?,
            postings: BTreeMap::new(),
        };
        for chunk in fields[5..].chunks_exact(3) {
            let posting = Posting {
                term_frequency: parse_field(chunk[1], "tf", origin, line_no)?,
                tf_idf: parse_field(chunk[2], "tf-idf", origin, line_no)?,
            };
            if entry.postings.insert(chunk[0].to_string(), posting).is_some() {
                return Err(SearchError::malformed(origin, line_no, format!("duplicate posting for url '{}'", chunk[0])));
            }
        }
        if entry.document_frequency != entry.postings.len() {
            return Err(SearchError::malformed(
                origin,
                line_no,
                format!("dft is {} but {} postings follow", entry.document_frequency, entry.postings.len()),
            ));
        }
        if terms.insert(term, entry).is_some() {
            return Err(SearchError::malformed(origin, line_no, format!("duplicate term '{}'", fields[0])));
        }
    }
    Ok(terms.into_iter().collect())
}

/// Every URL must be encodable, otherwise the summary count would not match
/// the listed documents on reload.
pub fn encode_stats<W: Write>(stats: &CorpusStats, out: &mut W) -> Result<WriteReport> {
    let mut report = WriteReport::default();
    if let Some(url) = stats.documents.keys().find(|url| !is_encodable(url)) {
        return Err(SearchError::UnencodableUrl(url.clone()));
    }
    for (url, doc) in &stats.documents {
        writeln!(out, "{} {} {}", url, doc.token_count, doc.sentiment_total)?;
        report.lines_written += 1;
    }
    writeln!(
        out,
        "{} {} {} {} {} {}",
        SUMMARY_PREFIX, stats.document_count, stats.total_tokens, stats.avg_tokens, stats.total_sentiment, stats.avg_sentiment
    )?;
    report.lines_written += 1;
    Ok(report)
}

pub fn decode_stats<R: BufRead>(input: R, origin: &Path) -> Result<CorpusStats> {
    let mut documents: BTreeMap<String, DocumentStats> = BTreeMap::new();
    let mut summary: Option<(usize, CorpusStats)> = None;
    for (i, line) in input.lines().enumerate() {
        let line_no = i + 1;
        let line = line?;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() { continue; }
        if let Some((summary_line, _)) = &summary {
            return Err(SearchError::malformed(origin, line_no, format!("unexpected content after summary on line {summary_line}")));
        }
        if fields[0] == SUMMARY_PREFIX {
            if fields.len() != 6 {
                return Err(SearchError::malformed(origin, line_no, format!("summary expects 5 values, found {}", fields.len() - 1)));
            }
            let stats = CorpusStats {
                document_count: parse_field(fields[1], "document_count", origin, line_no)?,
                total_tokens: parse_field(fields[2], "total_tokens", origin, line_no)?,
                avg_tokens: parse_field(fields[3], "avg_tokens", origin, line_no)?,
                total_sentiment: parse_field(fields[4], "total_sentiment", origin, line_no)?,
                avg_sentiment: parse_field(fields[5], "avg_sentiment", origin, line_no)?,
                documents: BTreeMap::new(),
            };
            summary = Some((line_no, stats));
            continue;
        }
        if fields.len() != 3 {
            return Err(SearchError::malformed(origin, line_no, format!("expected 3 fields, found {}", fields.len())));
        }
        let doc = DocumentStats {
            token_count: parse_field(fields[1], "token_count", origin, line_no)?,
            sentiment_total: parse_field(fields[2], "sentiment_total", origin, line_no)?,
        };
        if documents.insert(fields[0].to_string(), doc).is_some() {
            return Err(SearchError::malformed(origin, line_no, format!("duplicate url '{}'", fields[0])));
        }
    }

    let Some((line_no, mut stats)) = summary else {
        return Err(SearchError::malformed(origin, 0, "missing SUMMARY line"));
    };
    if stats.document_count == 0 {
        return Err(SearchError::malformed(origin, line_no, "document_count must be at least 1"));
    }
    if stats.document_count != documents.len() {
        return Err(SearchError::malformed(
            origin,
            line_no,
            format!("summary counts {} documents but {} are listed", stats.document_count, documents.len()),
        ));
    }
    stats.documents = documents;
    Ok(stats)
}

pub fn encode_options<W: Write>(options: &TokenizerOptions, out: &mut W) -> Result<()> {
    writeln!(out, "remove_stopwords={}", options.remove_stopwords)?;
    writeln!(out, "stem={}", options.stem)?;
    Ok(())
}

pub fn decode_options<R: BufRead>(input: R, origin: &Path) -> Result<TokenizerOptions> {
    let mut options = TokenizerOptions::default();
    for (i, line) in input.lines().enumerate() {
        let line_no = i + 1;
        let line = line?;
        let line = line.trim();
        if line.is_empty() { continue; }
        let Some((key, value)) = line.split_once('=') else {
            return Err(SearchError::malformed(origin, line_no, format!("expected key=value, found '{line}'")));
        };
        match key.trim() {
            "remove_stopwords" => options.remove_stopwords = parse_field(value.trim(), key, origin, line_no)?,
            "stem" => options.stem = parse_field(value.trim(), key, origin, line_no)?,
            other => return Err(SearchError::malformed(origin, line_no, format!("unknown tokenizer option '{other}'"))),
        }
    }
    Ok(options)
}

fn parse_field<T: FromStr>(raw: &str, name: &str, origin: &Path, line: usize) -> Result<T> {
    raw.parse()
        .map_err(|_| SearchError::malformed(origin, line, format!("invalid {name} value '{raw}'")))
}

pub fn save_index(paths: &IndexPaths, index: &InvertedIndex) -> Result<WriteReport> {
    create_dir_all(&paths.root)?;
    let path = paths.index();
    let mut out = BufWriter::new(File::create(&path)?);
    let report = encode_index(index, &mut out)?;
    out.flush()?;
    report.warn_if_skipped("terms", &path);
    tracing::info!(path = %path.display(), lines = report.lines_written, "index written");
    Ok(report)
}

pub fn load_index(paths: &IndexPaths) -> Result<InvertedIndex> {
    let path = paths.index();
    let f = open_existing(&path)?;
    decode_index(BufReader::new(f), &path)
}

pub fn save_stats(paths: &IndexPaths, stats: &CorpusStats) -> Result<WriteReport> {
    create_dir_all(&paths.root)?;
    let path = paths.stats();
    let mut out = BufWriter::new(File::create(&path)?);
    let report = encode_stats(stats, &mut out)?;
    out.flush()?;
    tracing::info!(path = %path.display(), lines = report.lines_written, "corpus stats written");
    Ok(report)
}

pub fn load_stats(paths: &IndexPaths) -> Result<CorpusStats> {
    let path = paths.stats();
    let f = open_existing(&path)?;
    decode_stats(BufReader::new(f), &path)
}

pub fn save_options(paths: &IndexPaths, options: &TokenizerOptions) -> Result<()> {
    create_dir_all(&paths.root)?;
    let path = paths.options();
    let mut out = BufWriter::new(File::create(&path)?);
    encode_options(options, &mut out)?;
    out.flush()?;
    tracing::info!(path = %path.display(), ?options, "tokenizer options written");
    Ok(())
}

/// Tokenizer options of a snapshot. A snapshot without `tokenizer.txt` was
/// built from unfiltered terms.
pub fn load_options(paths: &IndexPaths) -> Result<TokenizerOptions> {
    let path = paths.options();
    if !path.is_file() {
        return Ok(TokenizerOptions::default());
    }
    decode_options(BufReader::new(File::open(&path)?), &path)
}

/// Load both persisted files, failing before reading either if one is absent.
pub fn load_snapshot(paths: &IndexPaths) -> Result<(InvertedIndex, CorpusStats)> {
    for path in [paths.index(), paths.stats()] {
        if !path.is_file() {
            return Err(SearchError::MissingPersistedState(path));
        }
    }
    let stats = load_stats(paths)?;
    let index = load_index(paths)?;
    tracing::info!(num_docs = stats.document_count, num_terms = index.len(), "loaded persisted index");
    Ok((index, stats))
}

/// Load a snapshot into a query engine that cleans query text the way the
/// feed was cleaned.
pub fn load_engine(paths: &IndexPaths) -> Result<QueryEngine> {
    let (index, stats) = load_snapshot(paths)?;
    let options = load_options(paths)?;
    Ok(QueryEngine::new(index, stats).with_options(options))
}

fn open_existing(path: &Path) -> Result<File> {
    if !path.is_file() {
        return Err(SearchError::MissingPersistedState(path.to_path_buf()));
    }
    Ok(File::open(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{build, collect, Document};

    fn sample() -> (InvertedIndex, CorpusStats) {
        let docs = vec![
            Document::new("https://a.example/x", vec!["happy".into(), "day".into(), "happy".into()]),
            Document::new("https://b.example/y", vec!["sad".into(), "day".into()]),
            Document::new("https://c.example/z", vec!["night".into()]),
        ];
        let stats = collect(&docs).unwrap();
        (build(&docs, &stats), stats)
    }

    fn origin() -> PathBuf { PathBuf::from("test.txt") }

    #[test]
    fn index_round_trips_exactly() {
        let (index, _) = sample();
        let mut buf = Vec::new();
        let report = encode_index(&index, &mut buf).unwrap();
        assert_eq!(report.lines_written, index.len());
        assert!(report.skipped.is_empty());
        let decoded = decode_index(buf.as_slice(), &origin()).unwrap();
        assert_eq!(decoded, index);
    }

    #[test]
    fn index_lines_are_sorted_by_term() {
        let (index, _) = sample();
        let mut buf = Vec::new();
        encode_index(&index, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let terms: Vec<&str> = text.lines().map(|l| l.split(' ').next().unwrap()).collect();
        assert_eq!(terms, vec!["day", "happy", "night", "sad"]);
        let idf = 1.5f64.log10();
        assert!(text.starts_with(&format!("day 2 2 {idf} 0 https://a.example/x 1 {idf} https://b.example/y 1 {idf}\n")));
    }

    #[test]
    fn stats_round_trip_exactly() {
        let (_, stats) = sample();
        let mut buf = Vec::new();
        let report = encode_stats(&stats, &mut buf).unwrap();
        assert_eq!(report.lines_written, 4);
        let text = String::from_utf8(buf.clone()).unwrap();
        assert_eq!(text.lines().last().unwrap(), "SUMMARY: 3 6 2 4 1.3333333333333333");
        assert_eq!(decode_stats(buf.as_slice(), &origin()).unwrap(), stats);
    }

    #[test]
    fn unencodable_terms_are_reported_not_swallowed() {
        let docs = vec![Document::new("u", vec!["fine".into(), "two words".into(), "".into()])];
        let stats = collect(&docs).unwrap();
        let index = build(&docs, &stats);
        let mut buf = Vec::new();
        let report = encode_index(&index, &mut buf).unwrap();
        assert_eq!(report.lines_written, 1);
        assert_eq!(report.skipped_count(), 2);
        assert!(report.skipped.contains(&"two words".to_string()));
        let decoded = decode_index(buf.as_slice(), &origin()).unwrap();
        assert!(decoded.contains("fine"));
        assert_eq!(decoded.len(), 1);
    }

    #[test]
    fn unencodable_urls_fail_the_write_instead_of_dropping_postings() {
        let good = Document::new("https://ex.com/c", vec!["day".into()]);
        let bad = Document::new("https://ex.com/a b", vec!["happy".into(), "day".into()]);
        let stats = collect(&[good.clone()]).unwrap();
        let index = build(&[bad, good], &stats);
        let err = encode_index(&index, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, SearchError::UnencodableUrl(ref url) if url == "https://ex.com/a b"));

        let mut stats = stats;
        stats.documents.insert("https://ex.com/a b".into(), DocumentStats::default());
        stats.document_count = 2;
        let err = encode_stats(&stats, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, SearchError::UnencodableUrl(_)));
    }

    #[test]
    fn malformed_index_lines_are_rejected() {
        let cases = [
            "happy 1 1 0.3 3\n",
            "happy 1 1 0.3 3 a 1\n",
            "happy x 1 0.3 3 a 1 0.3\n",
            "happy 1 2 0.3 3 a 1 0.3\n",
            "happy 1 1 0.3 3 a 1 0.3\nhappy 1 1 0.3 3 a 1 0.3\n",
        ];
        for case in cases {
            let err = decode_index(case.as_bytes(), &origin()).unwrap_err();
            assert!(matches!(err, SearchError::MalformedPersistedState { .. }), "{case:?}");
        }
    }

    #[test]
    fn malformed_stats_are_rejected() {
        let cases = [
            "a 1 0\n",
            "a 1 0\nSUMMARY: 2 1 1 0 0\n",
            "a one 0\nSUMMARY: 1 1 1 0 0\n",
            "a 1 0\nSUMMARY: 1 1 1 0\n",
            "a 1 0\nSUMMARY: 1 1 1 0 0\nb 1 0\n",
            "SUMMARY: 0 0 0 0 0\n",
        ];
        for case in cases {
            let err = decode_stats(case.as_bytes(), &origin()).unwrap_err();
            assert!(matches!(err, SearchError::MalformedPersistedState { .. }), "{case:?}");
        }
    }

    #[test]
    fn options_round_trip_and_default_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        assert_eq!(load_options(&paths).unwrap(), TokenizerOptions::default());

        let options = TokenizerOptions { remove_stopwords: true, stem: true };
        save_options(&paths, &options).unwrap();
        assert_eq!(load_options(&paths).unwrap(), options);
    }

    #[test]
    fn malformed_options_are_rejected() {
        for case in ["stem\n", "stem=maybe\n", "lowercase=true\n"] {
            let err = decode_options(case.as_bytes(), &origin()).unwrap_err();
            assert!(matches!(err, SearchError::MalformedPersistedState { .. }), "{case:?}");
        }
    }

    #[test]
    fn blank_lines_are_ignored() {
        let index = decode_index("\nhappy 1 1 0.5 3 a 1 0.5\n\n".as_bytes(), &origin()).unwrap();
        assert_eq!(index.len(), 1);
        let stats = decode_stats("a 1 3\n\nSUMMARY: 1 1 1 3 3\n\n".as_bytes(), &origin()).unwrap();
        assert_eq!(stats.document_count, 1);
    }
}
