//! Distinctive terms of a batch, ranked by mean TF-IDF.
//!
//! Each post is tokenized into lowercase words of two or more characters,
//! English stop words are dropped, and n-grams are formed from what is left.
//! IDF is smoothed (`ln((1 + n) / (1 + df)) + 1`) and every post's vector is
//! L2-normalized before the per-term mean is taken over all posts.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Terms kept by [`TermRanker::default`].
pub const TOP_TERMS: usize = 20;

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w\w+\b").expect("valid token regex"));

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TermScore {
    pub term: String,
    pub score: f64,
}

/// Ranks the terms of a set of posts. Unigrams and bigrams by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermRanker {
    top_n: usize,
    max_ngram: usize,
}

impl Default for TermRanker {
    fn default() -> Self {
        Self {
            top_n: TOP_TERMS,
            max_ngram: 2,
        }
    }
}

impl TermRanker {
    /// `max_ngram` below 1 is treated as 1.
    #[must_use]
    pub fn new(top_n: usize, max_ngram: usize) -> Self {
        Self {
            top_n,
            max_ngram: max_ngram.max(1),
        }
    }

    /// Highest mean TF-IDF first; equal scores are ordered by term.
    #[must_use]
    pub fn rank<'a, I>(&self, documents: I) -> Vec<TermScore>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let counts: Vec<BTreeMap<String, usize>> =
            documents.into_iter().map(|d| self.term_counts(d)).collect();
        if counts.is_empty() || self.top_n == 0 {
            return Vec::new();
        }

        let mut df: BTreeMap<&str, usize> = BTreeMap::new();
        for doc in &counts {
            for term in doc.keys() {
                *df.entry(term.as_str()).or_insert(0) += 1;
            }
        }

        #[allow(clippy::cast_precision_loss)]
        let n_docs = counts.len() as f64;
        let idf: BTreeMap<&str, f64> = df
            .iter()
            .map(|(term, &freq)| {
                #[allow(clippy::cast_precision_loss)]
                let weight = ((1.0 + n_docs) / (1.0 + freq as f64)).ln() + 1.0;
                (*term, weight)
            })
            .collect();

        let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
        for doc in &counts {
            let weighted: Vec<(&str, f64)> = doc
                .iter()
                .map(|(term, &tf)| {
                    #[allow(clippy::cast_precision_loss)]
                    let w = tf as f64 * idf[term.as_str()];
                    (term.as_str(), w)
                })
                .collect();
            if weighted.is_empty() {
                continue;
            }
            let norm = weighted.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
            for (term, w) in weighted {
                *totals.entry(term).or_insert(0.0) += w / norm;
            }
        }

        let mut scores: Vec<TermScore> = totals
            .into_iter()
            .map(|(term, total)| TermScore {
                term: term.to_string(),
                score: total / n_docs,
            })
            .collect();
        // Stable sort over key-ordered input keeps ties alphabetical.
        scores.sort_by(|a, b| b.score.total_cmp(&a.score));
        scores.truncate(self.top_n);
        scores
    }

    fn term_counts(&self, document: &str) -> BTreeMap<String, usize> {
        let lowered = document.to_lowercase();
        let tokens: Vec<&str> = TOKEN_RE
            .find_iter(&lowered)
            .map(|m| m.as_str())
            .filter(|t| !is_stop_word(t))
            .collect();

        let mut counts = BTreeMap::new();
        for n in 1..=self.max_ngram {
            for window in tokens.windows(n) {
                *counts.entry(window.join(" ")).or_insert(0) += 1;
            }
        }
        counts
    }
}

fn is_stop_word(word: &str) -> bool {
    matches!(
        word,
        "a" | "about"
            | "after"
            | "all"
            | "am"
            | "an"
            | "and"
            | "any"
            | "are"
            | "as"
            | "at"
            | "be"
            | "been"
            | "but"
            | "by"
            | "can"
            | "do"
            | "for"
            | "from"
            | "had"
            | "has"
            | "have"
            | "he"
            | "her"
            | "his"
            | "how"
            | "if"
            | "in"
            | "into"
            | "is"
            | "it"
            | "its"
            | "just"
            | "me"
            | "more"
            | "my"
            | "no"
            | "not"
            | "now"
            | "of"
            | "on"
            | "or"
            | "our"
            | "out"
            | "so"
            | "than"
            | "that"
            | "the"
            | "their"
            | "them"
            | "then"
            | "there"
            | "these"
            | "they"
            | "this"
            | "to"
            | "too"
            | "up"
            | "very"
            | "was"
            | "we"
            | "were"
            | "what"
            | "when"
            | "which"
            | "who"
            | "will"
            | "with"
            | "you"
            | "your"
    )
}
