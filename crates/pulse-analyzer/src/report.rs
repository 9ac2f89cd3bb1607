//! Batch-level trading report.

use std::collections::BTreeMap;

use pulse_core::{AggregatedSignal, DirectionCounts, Recommendation, Signal};
use serde::Serialize;

use crate::terms::TermScore;

/// Groups listed in [`TradingReport::top_groups`].
pub const TOP_GROUPS: usize = 10;

const MARKET_BAND: f64 = 0.1;
const STRONG_SIGNAL: f64 = 0.5;

/// Overall mood of a batch, from its mean composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarketSentiment {
    Bullish,
    Bearish,
    Neutral,
}

impl MarketSentiment {
    /// `> 0.1` bullish, `< -0.1` bearish, otherwise neutral.
    #[must_use]
    pub fn from_mean(mean: f64) -> Self {
        if mean > MARKET_BAND {
            MarketSentiment::Bullish
        } else if mean < -MARKET_BAND {
            MarketSentiment::Bearish
        } else {
            MarketSentiment::Neutral
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRanking<K> {
    pub key: K,
    pub mean_signal: f64,
    pub record_count: usize,
    pub recommendation: Recommendation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradingReport<K> {
    pub total_records: usize,
    pub mean_signal: f64,
    /// Sample standard deviation; `0.0` below two records.
    pub std_signal: f64,
    pub market_sentiment: MarketSentiment,
    pub distribution: DirectionCounts,
    /// Percent of records, `0.0..=100.0`.
    pub bullish_pct: f64,
    pub bearish_pct: f64,
    pub neutral_pct: f64,
    pub strong_bullish: usize,
    pub strong_bearish: usize,
    /// Highest mean signal first; ties keep key order.
    pub top_groups: Vec<GroupRanking<K>>,
    /// Empty unless attached with [`TradingReport::with_top_terms`].
    pub top_terms: Vec<TermScore>,
}

impl<K: Clone> TradingReport<K> {
    /// Summarize every signal in a batch alongside its aggregated groups.
    #[must_use]
    pub fn build<'a, I>(signals: I, groups: &BTreeMap<K, AggregatedSignal<K>>) -> Self
    where
        I: IntoIterator<Item = &'a Signal>,
    {
        let mut composites = Vec::new();
        let mut distribution = DirectionCounts::default();
        let mut strong_bullish = 0;
        let mut strong_bearish = 0;
        for signal in signals {
            composites.push(signal.composite);
            distribution.record(signal.direction);
            if signal.composite > STRONG_SIGNAL {
                strong_bullish += 1;
            } else if signal.composite < -STRONG_SIGNAL {
                strong_bearish += 1;
            }
        }

        let total_records = composites.len();
        let (mean_signal, std_signal) = mean_and_std(&composites);

        let mut top_groups: Vec<GroupRanking<K>> = groups
            .values()
            .map(|g| GroupRanking {
                key: g.group_key.clone(),
                mean_signal: g.mean_signal,
                record_count: g.record_count,
                recommendation: g.recommendation,
            })
            .collect();
        top_groups.sort_by(|a, b| b.mean_signal.total_cmp(&a.mean_signal));
        top_groups.truncate(TOP_GROUPS);

        Self {
            total_records,
            mean_signal,
            std_signal,
            market_sentiment: MarketSentiment::from_mean(mean_signal),
            bullish_pct: percent(distribution.bullish, total_records),
            bearish_pct: percent(distribution.bearish, total_records),
            neutral_pct: percent(distribution.neutral, total_records),
            distribution,
            strong_bullish,
            strong_bearish,
            top_groups,
            top_terms: Vec::new(),
        }
    }

    /// Attach the batch's ranked terms, e.g. from
    /// [`TermRanker::rank`](crate::TermRanker::rank).
    #[must_use]
    pub fn with_top_terms(mut self, terms: Vec<TermScore>) -> Self {
        self.top_terms = terms;
        self
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean_and_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var.sqrt())
}

#[allow(clippy::cast_precision_loss)]
fn percent(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}
