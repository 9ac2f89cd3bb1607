//! Batch orchestration: normalize, deduplicate, extract, score, group.
//!
//! One bad record never aborts a batch. Rejections, duplicates, degraded
//! extractions and ungrouped records are counted in [`BatchSummary`].

use std::sync::Arc;

use pulse_core::{CleanRecord, ConfigError, FeatureVector, PipelineConfig, RawRecord, Signal};
use pulse_processor::{
    DedupOutcome, DedupSummary, Deduplicator, NormalizeOutcome, NormalizeSummary, Normalizer,
    SeenIndex,
};
use serde::Serialize;

use crate::aggregate::{AggregationState, Aggregator};
use crate::features::FeatureExtractor;
use crate::grouping::GroupBy;
use crate::scorer::{LexiconScorer, SentimentScorer};
use crate::signal::{EngagementScale, SignalGenerator};

/// A kept record with everything derived from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredRecord {
    pub record: CleanRecord,
    pub features: FeatureVector,
    pub signal: Signal,
    /// Aggregation keys this record contributed to.
    pub group_keys: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub input: usize,
    pub normalize: NormalizeSummary,
    pub dedup: DedupSummary,
    pub scored: usize,
    /// Scored with neutral sentiment defaults after a scorer failure.
    pub degraded: usize,
    pub extraction_failures: usize,
    /// Scored records with no group key.
    pub ungrouped: usize,
    pub groups: usize,
}

impl BatchSummary {
    /// Add another shard's counts to this one. `groups` is left alone since
    /// shards can share keys; recompute it from the merged
    /// [`AggregationState`].
    pub fn merge(&mut self, other: &BatchSummary) {
        self.input += other.input;
        self.normalize.merge(&other.normalize);
        self.dedup.merge(&other.dedup);
        self.scored += other.scored;
        self.degraded += other.degraded;
        self.extraction_failures += other.extraction_failures;
        self.ungrouped += other.ungrouped;
    }
}

#[derive(Debug, Clone)]
pub struct BatchResult {
    /// Every input record, valid or not, in input order.
    pub normalized: NormalizeOutcome,
    /// Deduplication over the valid records. Indices refer to positions
    /// among the valid records, not the raw input.
    pub dedup: DedupOutcome,
    pub scored: Vec<ScoredRecord>,
    /// Unsummarized group contributions, mergeable with other batches.
    pub aggregation: AggregationState<String>,
    pub summary: BatchSummary,
}

/// The full per-batch pipeline, built once from a validated configuration.
#[derive(Debug, Clone)]
pub struct Pipeline {
    normalizer: Normalizer,
    deduplicator: Deduplicator,
    extractor: FeatureExtractor,
    signals: SignalGenerator,
    aggregator: Aggregator,
    group_by: GroupBy,
    engagement_scale: Option<EngagementScale>,
}

impl Pipeline {
    /// Pipeline using the built-in [`LexiconScorer`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any section of `config` is out
    /// of range.
    pub fn new(config: &PipelineConfig, group_by: GroupBy) -> Result<Self, ConfigError> {
        Self::with_scorer(config, group_by, Arc::new(LexiconScorer::new()))
    }

    /// # Errors
    ///
    /// See [`Pipeline::new`].
    pub fn with_scorer(
        config: &PipelineConfig,
        group_by: GroupBy,
        scorer: Arc<dyn SentimentScorer>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            normalizer: Normalizer::new(config.cleaning.clone()),
            deduplicator: Deduplicator::new(config.dedup.clone())?,
            extractor: FeatureExtractor::new(config.features.clone(), scorer)?,
            signals: SignalGenerator::new(config.signal.clone())?,
            aggregator: Aggregator::new(config.aggregation.clone())?,
            group_by,
            engagement_scale: None,
        })
    }

    /// Use `scale` for every batch instead of calibrating per batch.
    ///
    /// Shards of one input should share a scale so their signals stay
    /// comparable.
    #[must_use]
    pub fn with_engagement_scale(mut self, scale: EngagementScale) -> Self {
        self.engagement_scale = Some(scale);
        self
    }

    #[must_use]
    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    #[must_use]
    pub fn signal_generator(&self) -> &SignalGenerator {
        &self.signals
    }

    #[must_use]
    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    #[must_use]
    pub fn group_by(&self) -> GroupBy {
        self.group_by
    }

    /// Run one self-contained batch.
    #[must_use]
    pub fn run(&self, raws: &[RawRecord]) -> BatchResult {
        let normalized = self.normalizer.normalize_batch(raws);
        let valid: Vec<CleanRecord> = normalized.valid().cloned().collect();
        let dedup = self.deduplicator.deduplicate(&valid);
        self.score(raws.len(), normalized, dedup)
    }

    /// Run one batch of a stream, skipping records already kept by earlier
    /// batches and adding this batch's survivors to `seen`.
    pub fn run_incremental(&self, raws: &[RawRecord], seen: &mut SeenIndex) -> BatchResult {
        let normalized = self.normalizer.normalize_batch(raws);
        let valid: Vec<CleanRecord> = normalized.valid().cloned().collect();
        let dedup = self.deduplicator.deduplicate_against(&valid, seen);
        self.score(raws.len(), normalized, dedup)
    }

    fn score(
        &self,
        input: usize,
        normalized: NormalizeOutcome,
        dedup: DedupOutcome,
    ) -> BatchResult {
        let generator = match self.engagement_scale {
            Some(scale) => self.signals.clone().with_scale(scale),
            None => self.signals.calibrated(&dedup.kept),
        };

        let mut summary = BatchSummary {
            input,
            normalize: normalized.summary.clone(),
            dedup: dedup.summary,
            ..BatchSummary::default()
        };
        let mut aggregation = AggregationState::new();
        let mut scored = Vec::with_capacity(dedup.kept.len());

        for record in &dedup.kept {
            let features = match self.extractor.extract(record) {
                Ok(features) => features,
                Err(e) => {
                    tracing::warn!(
                        record = %record.label(),
                        error = %e,
                        "feature extraction failed; record skipped"
                    );
                    summary.extraction_failures += 1;
                    continue;
                }
            };
            if features.degraded {
                summary.degraded += 1;
            }

            let signal = generator.generate(record, &features);
            let group_keys = self.group_by.keys(record);
            if group_keys.is_empty() {
                summary.ungrouped += 1;
            }
            for key in &group_keys {
                aggregation.add(key.clone(), &signal);
            }

            scored.push(ScoredRecord {
                record: record.clone(),
                features,
                signal,
                group_keys,
            });
        }

        summary.scored = scored.len();
        summary.groups = aggregation.len();

        tracing::info!(
            input = summary.input,
            valid = summary.normalize.valid,
            kept = summary.dedup.kept,
            scored = summary.scored,
            degraded = summary.degraded,
            ungrouped = summary.ungrouped,
            groups = summary.groups,
            group_by = %self.group_by,
            "batch scored"
        );

        BatchResult {
            normalized,
            dedup,
            scored,
            aggregation,
            summary,
        }
    }
}
