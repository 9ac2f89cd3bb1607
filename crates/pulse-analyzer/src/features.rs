//! Text features for one clean record.

use std::sync::{Arc, LazyLock};

use pulse_core::{
    CleanRecord, ConfigError, Direction, FeatureConfig, FeatureVector, SentimentLabel,
};
use regex::Regex;

use crate::scorer::{LexiconScorer, SentimentScore, SentimentScorer};
use crate::AnalyzerError;

/// A standalone number or a currency amount. `nifty50` does not count.
static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[$₹€£]\s?\d|\b(?:rs\.?|inr)\s?\d|\b\d[\d,]*(?:\.\d+)?\b")
        .expect("valid number regex")
});

static PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\d+(?:\.\d+)?\s*%").expect("valid percent regex"));

/// A configured term list, each term pre-split into lowercase tokens so
/// multi-word phrases (`"all time high"`) match token windows.
#[derive(Debug, Clone)]
struct TermList {
    phrases: Vec<Vec<String>>,
}

impl TermList {
    fn new(terms: &[String]) -> Self {
        let phrases = terms
            .iter()
            .map(|t| tokenize(t))
            .filter(|p| !p.is_empty())
            .collect();
        Self { phrases }
    }

    /// Occurrences of any phrase in `tokens`, counting repeats.
    fn count_matches(&self, tokens: &[String]) -> usize {
        self.phrases
            .iter()
            .map(|phrase| {
                if phrase.len() == 1 {
                    tokens.iter().filter(|t| **t == phrase[0]).count()
                } else {
                    tokens.windows(phrase.len()).filter(|w| *w == phrase.as_slice()).count()
                }
            })
            .sum()
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Derives a [`FeatureVector`] from a valid [`CleanRecord`].
///
/// Deterministic for a deterministic scorer: the same record always yields
/// the same vector.
#[derive(Clone)]
pub struct FeatureExtractor {
    config: FeatureConfig,
    bullish: TermList,
    bearish: TermList,
    urgency: TermList,
    scorer: Arc<dyn SentimentScorer>,
}

impl std::fmt::Debug for FeatureExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureExtractor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FeatureExtractor {
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if the term lists or thresholds are
    /// invalid.
    pub fn new(
        config: FeatureConfig,
        scorer: Arc<dyn SentimentScorer>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            bullish: TermList::new(&config.bullish_terms),
            bearish: TermList::new(&config.bearish_terms),
            urgency: TermList::new(&config.urgency_terms),
            config,
            scorer,
        })
    }

    /// Extractor backed by the built-in [`LexiconScorer`].
    ///
    /// # Errors
    ///
    /// See [`FeatureExtractor::new`].
    pub fn with_lexicon(config: FeatureConfig) -> Result<Self, ConfigError> {
        Self::new(config, Arc::new(LexiconScorer::new()))
    }

    /// # Errors
    ///
    /// Returns [`AnalyzerError::InvalidRecord`] if the record was rejected by
    /// the normalizer. A failing sentiment scorer is not an error: neutral
    /// defaults are used and `degraded` is set.
    pub fn extract(&self, record: &CleanRecord) -> Result<FeatureVector, AnalyzerError> {
        if let Some(reason) = record.rejection {
            return Err(AnalyzerError::InvalidRecord {
                record: record.label(),
                reason: reason.to_string(),
            });
        }

        let text = &record.normalized_text;
        let (sentiment, degraded) = match self.scorer.score(text) {
            Ok(score) if score.polarity.is_finite() && score.subjectivity.is_finite() => (
                SentimentScore {
                    polarity: score.polarity.clamp(-1.0, 1.0),
                    subjectivity: score.subjectivity.clamp(0.0, 1.0),
                },
                false,
            ),
            Ok(score) => {
                tracing::warn!(
                    record = %record.label(),
                    polarity = score.polarity,
                    subjectivity = score.subjectivity,
                    "sentiment scorer returned a non-finite score; using neutral defaults"
                );
                (SentimentScore::FALLBACK, true)
            }
            Err(e) => {
                tracing::warn!(
                    record = %record.label(),
                    error = %e,
                    "sentiment scorer failed; using neutral defaults"
                );
                (SentimentScore::FALLBACK, true)
            }
        };

        let tokens = tokenize(text);
        let token_count = tokens.len();
        let bullish_matches = self.bullish.count_matches(&tokens);
        let bearish_matches = self.bearish.count_matches(&tokens);
        let urgency_matches = self.urgency.count_matches(&tokens);

        let directional_total = bullish_matches + bearish_matches;
        #[allow(clippy::cast_precision_loss)]
        let directional_score = if directional_total == 0 {
            0.0
        } else {
            (bullish_matches as f64 - bearish_matches as f64) / directional_total as f64
        };
        let directional_label =
            Direction::from_score(directional_score, self.config.neutral_epsilon);

        let directional_confidence = density(directional_total, token_count);
        let exclamations = text.matches('!').count();
        #[allow(clippy::cast_precision_loss)]
        let urgency = (density(urgency_matches, token_count)
            + self.config.exclamation_bonus * exclamations as f64)
            .min(1.0);

        Ok(FeatureVector {
            polarity: sentiment.polarity,
            subjectivity: sentiment.subjectivity,
            sentiment_label: SentimentLabel::from_polarity(sentiment.polarity),
            directional_label,
            directional_confidence,
            urgency,
            has_numeric_mention: NUMBER_RE.is_match(text),
            has_percent_mention: PERCENT_RE.is_match(text),
            token_count,
            bullish_matches,
            bearish_matches,
            degraded,
        })
    }
}

/// `matches / tokens`, capped at 1. Zero when there are no tokens.
fn density(matches: usize, tokens: usize) -> f64 {
    if tokens == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = matches as f64 / tokens as f64;
    ratio.min(1.0)
}

#[cfg(test)]
#[path = "features_test.rs"]
mod tests;
