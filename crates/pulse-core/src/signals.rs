use serde::{Deserialize, Serialize};

/// Inferred market direction of a post or group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Bullish,
    Bearish,
    Neutral,
}

impl Direction {
    /// `+1` for bullish, `-1` for bearish, `0` for neutral.
    #[must_use]
    pub fn sign(self) -> f64 {
        match self {
            Direction::Bullish => 1.0,
            Direction::Bearish => -1.0,
            Direction::Neutral => 0.0,
        }
    }

    /// Classifies a signed score, treating `|score| < epsilon` as neutral.
    #[must_use]
    pub fn from_score(score: f64, epsilon: f64) -> Self {
        if score.abs() < epsilon || score.is_nan() {
            Direction::Neutral
        } else if score > 0.0 {
            Direction::Bullish
        } else {
            Direction::Bearish
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Bullish => "bullish",
            Direction::Bearish => "bearish",
            Direction::Neutral => "neutral",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// General tone of a post from its polarity, independent of market terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    /// Polarity strictly beyond this on either side is not neutral.
    pub const BAND: f64 = 0.1;

    #[must_use]
    pub fn from_polarity(polarity: f64) -> Self {
        if polarity > Self::BAND {
            SentimentLabel::Positive
        } else if polarity < -Self::BAND {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
        }
    }
}

impl std::fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text features derived from one valid clean record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// General sentiment polarity in `[-1, 1]`.
    pub polarity: f64,
    /// General sentiment subjectivity in `[0, 1]`.
    pub subjectivity: f64,
    pub sentiment_label: SentimentLabel,
    pub directional_label: Direction,
    /// Matched directional-term density in `[0, 1]`.
    pub directional_confidence: f64,
    /// Urgency in `[0, 1]`.
    pub urgency: f64,
    pub has_numeric_mention: bool,
    pub has_percent_mention: bool,
    pub token_count: usize,
    pub bullish_matches: usize,
    pub bearish_matches: usize,
    /// Set when the sentiment scorer failed and neutral defaults were used.
    pub degraded: bool,
}

/// The four sub-signals a composite score is built from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalComponents {
    /// `[-1, 1]`
    pub sentiment: f64,
    /// `[0, 1]`
    pub engagement: f64,
    /// `[0, 1]`
    pub urgency: f64,
    /// `[-1, 1]`, signed by the directional label.
    pub technical: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub low: f64,
    pub high: f64,
}

impl ConfidenceInterval {
    #[must_use]
    pub fn width(&self) -> f64 {
        self.high - self.low
    }

    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        self.low <= value && value <= self.high
    }
}

/// Composite trading signal for one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Composite score in `[-1, 1]`.
    pub composite: f64,
    /// `|composite|`
    pub strength: f64,
    pub direction: Direction,
    pub confidence_interval: ConfidenceInterval,
    pub components: SignalComponents,
}

/// Per-direction record counts within a group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionCounts {
    pub bullish: usize,
    pub bearish: usize,
    pub neutral: usize,
}

impl DirectionCounts {
    pub fn record(&mut self, direction: Direction) {
        match direction {
            Direction::Bullish => self.bullish += 1,
            Direction::Bearish => self.bearish += 1,
            Direction::Neutral => self.neutral += 1,
        }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.bullish + self.bearish + self.neutral
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    StrongSell,
    Sell,
    Hold,
    Buy,
    StrongBuy,
}

impl Recommendation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Recommendation::StrongBuy => "STRONG_BUY",
            Recommendation::Buy => "BUY",
            Recommendation::Hold => "HOLD",
            Recommendation::Sell => "SELL",
            Recommendation::StrongSell => "STRONG_SELL",
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of all signals sharing a group key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedSignal<K> {
    pub group_key: K,
    pub record_count: usize,
    pub mean_signal: f64,
    /// Sample standard deviation of composites; `0.0` for a single record.
    pub std_signal: f64,
    pub mean_strength: f64,
    pub mean_interval_width: f64,
    pub distribution: DirectionCounts,
    pub recommendation: Recommendation,
}
