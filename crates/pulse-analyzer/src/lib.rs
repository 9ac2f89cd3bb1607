//! Feature extraction, signal scoring and aggregation.
//!
//! Features are derived from a valid [`pulse_core::CleanRecord`], folded with
//! its engagement counters into a bounded [`pulse_core::Signal`], and signals
//! are grouped by tag or time bucket into
//! [`pulse_core::AggregatedSignal`]s with a recommendation. A batch can also
//! be summarized as a [`TradingReport`] with its top TF-IDF terms.

pub mod aggregate;
pub mod error;
pub mod features;
pub mod grouping;
pub mod pipeline;
pub mod report;
pub mod scorer;
pub mod signal;
pub mod terms;

pub use aggregate::{AggregationOutcome, AggregationState, Aggregator, OmittedGroup};
pub use error::AnalyzerError;
pub use features::FeatureExtractor;
pub use grouping::{bucket_width, tag_keys, time_bucket, GroupBy};
pub use pipeline::{BatchResult, BatchSummary, Pipeline, ScoredRecord};
pub use report::{GroupRanking, MarketSentiment, TradingReport, TOP_GROUPS};
pub use scorer::{LexiconScorer, SentimentScore, SentimentScorer};
pub use signal::{weighted_engagement, EngagementScale, SignalGenerator};
pub use terms::{TermRanker, TermScore, TOP_TERMS};
