//! Per-group signal summaries.
//!
//! Contributions are collected in an [`AggregationState`], which can be
//! merged across shards before [`Aggregator::finish`] computes statistics.
//! Merging concatenates contributions, so the mean over merged shards equals
//! the mean over the unsharded batch.

use std::collections::BTreeMap;

use pulse_core::{
    AggregatedSignal, AggregationConfig, ConfigError, Direction, DirectionCounts, Recommendation,
    RecommendationThresholds, Signal,
};
use serde::Serialize;

/// The parts of a [`Signal`] the aggregator needs.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Contribution {
    composite: f64,
    strength: f64,
    interval_width: f64,
    direction: Direction,
}

impl From<&Signal> for Contribution {
    fn from(signal: &Signal) -> Self {
        Self {
            composite: signal.composite,
            strength: signal.strength,
            interval_width: signal.confidence_interval.width(),
            direction: signal.direction,
        }
    }
}

/// Signals collected per group key, not yet summarized.
#[derive(Debug, Clone)]
pub struct AggregationState<K> {
    groups: BTreeMap<K, Vec<Contribution>>,
}

impl<K: Ord> Default for AggregationState<K> {
    fn default() -> Self {
        Self {
            groups: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Clone> AggregationState<K> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: K, signal: &Signal) {
        self.groups
            .entry(key)
            .or_default()
            .push(Contribution::from(signal));
    }

    /// Fold another shard's contributions into this one.
    pub fn merge(&mut self, other: AggregationState<K>) {
        for (key, mut contributions) in other.groups {
            self.groups
                .entry(key)
                .or_default()
                .append(&mut contributions);
        }
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    #[must_use]
    pub fn record_count(&self, key: &K) -> usize {
        self.groups.get(key).map_or(0, Vec::len)
    }
}

impl<K: Ord + Clone> Extend<(K, Signal)> for AggregationState<K> {
    fn extend<I: IntoIterator<Item = (K, Signal)>>(&mut self, iter: I) {
        for (key, signal) in iter {
            self.add(key, &signal);
        }
    }
}

/// A group left out for having too few records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OmittedGroup<K> {
    pub key: K,
    pub record_count: usize,
}

#[derive(Debug, Clone)]
pub struct AggregationOutcome<K> {
    pub groups: BTreeMap<K, AggregatedSignal<K>>,
    pub omitted: Vec<OmittedGroup<K>>,
}

#[derive(Debug, Clone)]
pub struct Aggregator {
    config: AggregationConfig,
}

impl Aggregator {
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if `min_count` is zero or the
    /// thresholds are out of order.
    pub fn new(config: AggregationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    /// Aggregate `(key, signal)` pairs using the configured minimum count.
    pub fn aggregate<K, I>(&self, pairs: I) -> AggregationOutcome<K>
    where
        K: Ord + Clone + std::fmt::Debug,
        I: IntoIterator<Item = (K, Signal)>,
    {
        self.aggregate_with_min(pairs, self.config.min_count)
    }

    /// Aggregate `(key, signal)` pairs, omitting groups with fewer than
    /// `min_count` records.
    pub fn aggregate_with_min<K, I>(&self, pairs: I, min_count: usize) -> AggregationOutcome<K>
    where
        K: Ord + Clone + std::fmt::Debug,
        I: IntoIterator<Item = (K, Signal)>,
    {
        let mut state = AggregationState::new();
        state.extend(pairs);
        self.finish_with_min(state, min_count)
    }

    /// Summarize a (possibly merged) state using the configured minimum count.
    #[must_use]
    pub fn finish<K>(&self, state: AggregationState<K>) -> AggregationOutcome<K>
    where
        K: Ord + Clone + std::fmt::Debug,
    {
        self.finish_with_min(state, self.config.min_count)
    }

    fn finish_with_min<K>(
        &self,
        state: AggregationState<K>,
        min_count: usize,
    ) -> AggregationOutcome<K>
    where
        K: Ord + Clone + std::fmt::Debug,
    {
        let mut groups = BTreeMap::new();
        let mut omitted = Vec::new();

        for (key, contributions) in state.groups {
            if contributions.len() < min_count {
                tracing::debug!(
                    group = ?key,
                    record_count = contributions.len(),
                    min_count,
                    "group below minimum count omitted"
                );
                omitted.push(OmittedGroup {
                    key,
                    record_count: contributions.len(),
                });
                continue;
            }
            let summary = self.summarize(key.clone(), &contributions);
            groups.insert(key, summary);
        }

        tracing::info!(
            groups = groups.len(),
            omitted = omitted.len(),
            min_count,
            "aggregation complete"
        );

        AggregationOutcome { groups, omitted }
    }

    fn summarize<K>(&self, key: K, contributions: &[Contribution]) -> AggregatedSignal<K> {
        #[allow(clippy::cast_precision_loss)]
        let n = contributions.len() as f64;

        let mean_signal = contributions.iter().map(|c| c.composite).sum::<f64>() / n;
        let std_signal = if contributions.len() > 1 {
            let var = contributions
                .iter()
                .map(|c| (c.composite - mean_signal).powi(2))
                .sum::<f64>()
                / (n - 1.0);
            var.sqrt()
        } else {
            0.0
        };
        let mean_strength = contributions.iter().map(|c| c.strength).sum::<f64>() / n;
        let mean_interval_width = contributions.iter().map(|c| c.interval_width).sum::<f64>() / n;

        let mut distribution = DirectionCounts::default();
        for c in contributions {
            distribution.record(c.direction);
        }

        AggregatedSignal {
            group_key: key,
            record_count: contributions.len(),
            mean_signal,
            std_signal,
            mean_strength,
            mean_interval_width,
            distribution,
            recommendation: recommend(mean_signal, &self.config.thresholds),
        }
    }
}

/// Map a mean signal onto the five recommendation bands.
///
/// Checked in order: `>= strong_buy`, `>= buy`, `<= strong_sell`, `<= sell`,
/// otherwise hold. The strong-sell band is checked before sell so that it is
/// reachable.
#[must_use]
pub fn recommend(mean_signal: f64, t: &RecommendationThresholds) -> Recommendation {
    if mean_signal.is_nan() {
        Recommendation::Hold
    } else if mean_signal >= t.strong_buy {
        Recommendation::StrongBuy
    } else if mean_signal >= t.buy {
        Recommendation::Buy
    } else if mean_signal <= t.strong_sell {
        Recommendation::StrongSell
    } else if mean_signal <= t.sell {
        Recommendation::Sell
    } else {
        Recommendation::Hold
    }
}

#[cfg(test)]
#[path = "aggregate_test.rs"]
mod tests;
