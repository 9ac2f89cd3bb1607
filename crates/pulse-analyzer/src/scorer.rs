//! General-purpose sentiment scoring.
//!
//! [`SentimentScorer`] is the seam for plugging in a different model;
//! [`LexiconScorer`] is the built-in word-list implementation.

use crate::AnalyzerError;

/// Polarity in `[-1, 1]`, subjectivity in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentimentScore {
    pub polarity: f64,
    pub subjectivity: f64,
}

impl SentimentScore {
    /// Used when the scorer fails.
    pub const FALLBACK: Self = Self {
        polarity: 0.0,
        subjectivity: 0.5,
    };
}

/// Anything that can score free text for general sentiment.
pub trait SentimentScorer: Send + Sync {
    /// # Errors
    ///
    /// Returns [`AnalyzerError::Scorer`] when no score can be produced.
    fn score(&self, text: &str) -> Result<SentimentScore, AnalyzerError>;
}

/// General sentiment words: `(word, polarity, subjectivity)`.
pub(crate) const LEXICON: &[(&str, f64, f64)] = &[
    // Positive
    ("good", 0.7, 0.6),
    ("great", 0.8, 0.75),
    ("excellent", 1.0, 1.0),
    ("amazing", 0.6, 0.9),
    ("awesome", 1.0, 1.0),
    ("wonderful", 1.0, 1.0),
    ("nice", 0.6, 1.0),
    ("best", 1.0, 0.3),
    ("better", 0.5, 0.5),
    ("happy", 0.8, 1.0),
    ("love", 0.5, 0.6),
    ("confident", 0.5, 0.8),
    ("solid", 0.3, 0.4),
    ("impressive", 0.7, 1.0),
    ("optimistic", 0.4, 0.6),
    ("win", 0.8, 0.4),
    ("winning", 0.5, 0.5),
    ("safe", 0.5, 0.5),
    ("healthy", 0.5, 0.5),
    ("beautiful", 0.85, 1.0),
    // Negative
    ("bad", -0.7, 0.67),
    ("terrible", -1.0, 1.0),
    ("awful", -1.0, 1.0),
    ("horrible", -1.0, 1.0),
    ("worst", -1.0, 1.0),
    ("worse", -0.4, 0.6),
    ("poor", -0.4, 0.6),
    ("sad", -0.5, 1.0),
    ("hate", -0.8, 0.9),
    ("ugly", -0.7, 1.0),
    ("worried", -0.4, 0.7),
    ("scary", -0.5, 1.0),
    ("risky", -0.4, 0.7),
    ("disappointing", -0.6, 0.7),
    ("pathetic", -1.0, 1.0),
    ("stupid", -0.8, 1.0),
    ("wrong", -0.5, 0.9),
    ("lose", -0.5, 0.5),
    ("losing", -0.5, 0.5),
    ("trouble", -0.4, 0.6),
];

const NEGATORS: &[&str] = &[
    "not", "no", "never", "dont", "don't", "isnt", "isn't", "wont", "won't",
];

/// Polarity flips to half strength in the other direction after a negator.
const NEGATION_FACTOR: f64 = -0.5;

/// Averages the polarity and subjectivity of lexicon words found in the text.
///
/// Text with no lexicon words scores `(0.0, 0.0)`. A word directly preceded
/// by a negator (`not good`) has its polarity multiplied by `-0.5`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexiconScorer;

impl LexiconScorer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SentimentScorer for LexiconScorer {
    fn score(&self, text: &str) -> Result<SentimentScore, AnalyzerError> {
        let words: Vec<String> = text
            .split_whitespace()
            .map(|w| {
                w.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
                    .to_lowercase()
            })
            .filter(|w| !w.is_empty())
            .collect();

        let mut polarity_sum = 0.0;
        let mut subjectivity_sum = 0.0;
        let mut matched = 0_u32;

        for (i, word) in words.iter().enumerate() {
            let Some(&(_, polarity, subjectivity)) =
                LEXICON.iter().find(|(lex_word, _, _)| lex_word == word)
            else {
                continue;
            };
            let negated = i > 0 && NEGATORS.contains(&words[i - 1].as_str());
            polarity_sum += if negated {
                polarity * NEGATION_FACTOR
            } else {
                polarity
            };
            subjectivity_sum += subjectivity;
            matched += 1;
        }

        if matched == 0 {
            return Ok(SentimentScore {
                polarity: 0.0,
                subjectivity: 0.0,
            });
        }

        let n = f64::from(matched);
        Ok(SentimentScore {
            polarity: (polarity_sum / n).clamp(-1.0, 1.0),
            subjectivity: (subjectivity_sum / n).clamp(0.0, 1.0),
        })
    }
}
