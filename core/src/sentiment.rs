use lazy_static::lazy_static;
use std::collections::HashMap;

use crate::tokenizer::words;

lazy_static! {
    /// AFINN-style valence lexicon: one `word<TAB>score` pair per line.
    static ref LEXICON: HashMap<&'static str, i32> = include_str!("../data/afinn.txt")
        .lines()
        .filter_map(|line| {
            let (word, score) = line.rsplit_once('\t')?;
            Some((word.trim(), score.trim().parse::<i32>().ok()?))
        })
        .collect();
}

/// Sum of the lexicon valences of every word in `text`. Unknown words score 0.
pub fn lexicon_score(text: &str) -> f64 {
    words(text)
        .iter()
        .map(|w| LEXICON.get(w.as_str()).copied().unwrap_or(0))
        .sum::<i32>() as f64
}
