//! The `run` command: load a batch, score it (optionally sharded by time
//! window), and write tables plus report.
//!
//! Shards run on blocking threads, at most `max_concurrent_shards` at a time.
//! Their aggregation states are merged in shard order before groups are
//! summarized. Deduplication is per shard.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use pulse_analyzer::{
    time_bucket, AggregationState, BatchSummary, EngagementScale, GroupBy, OmittedGroup, Pipeline,
    ScoredRecord, TermRanker, TradingReport,
};
use pulse_core::{CleanRecord, PipelineConfig, RawRecord, RuntimeConfig};
use serde::Serialize;
use uuid::Uuid;

use crate::sink;

#[derive(Debug)]
pub(crate) struct RunArgs {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub group_by: GroupBy,
    pub shard_hours: Option<u32>,
    pub dry_run: bool,
}

/// Everything produced by the shards of one run.
#[derive(Debug, Default)]
pub(crate) struct RunOutput {
    pub clean_records: Vec<CleanRecord>,
    pub scored: Vec<ScoredRecord>,
    pub aggregation: AggregationState<String>,
    pub summary: BatchSummary,
    pub shards: usize,
}

#[derive(Debug, Serialize)]
struct RunSummary<'a> {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    input: &'a Path,
    group_by: GroupBy,
    shards: usize,
    totals: &'a BatchSummary,
    reported_groups: usize,
    omitted_groups: &'a [OmittedGroup<String>],
}

/// Split `raws` into consecutive time windows of `hours` hours, keeping
/// input order within each window. No width means one shard.
pub(crate) fn shard_by_window(raws: Vec<RawRecord>, hours: Option<u32>) -> Vec<Vec<RawRecord>> {
    let Some(hours) = hours.filter(|h| *h > 0) else {
        return vec![raws];
    };
    let width = i64::from(hours) * 3_600;
    let mut windows: BTreeMap<DateTime<Utc>, Vec<RawRecord>> = BTreeMap::new();
    for raw in raws {
        windows
            .entry(time_bucket(raw.timestamp, width))
            .or_default()
            .push(raw);
    }
    windows.into_values().collect()
}

/// Score every shard and fold the results together.
///
/// # Errors
///
/// Returns an error if a shard task panics.
pub(crate) async fn process_shards(
    pipeline: Pipeline,
    shards: Vec<Vec<RawRecord>>,
    max_concurrent: usize,
) -> anyhow::Result<RunOutput> {
    let pipeline = Arc::new(pipeline);
    let shard_count = shards.len();

    let mut results: Vec<(usize, Result<_, tokio::task::JoinError>)> =
        stream::iter(shards.into_iter().enumerate())
            .map(|(i, shard)| {
                let pipeline = Arc::clone(&pipeline);
                async move {
                    let result = tokio::task::spawn_blocking(move || pipeline.run(&shard)).await;
                    (i, result)
                }
            })
            .buffer_unordered(max_concurrent.max(1))
            .collect()
            .await;
    results.sort_by_key(|(i, _)| *i);

    let mut output = RunOutput {
        shards: shard_count,
        ..RunOutput::default()
    };
    for (i, result) in results {
        let batch = result.with_context(|| format!("shard {i} failed"))?;
        tracing::debug!(shard = i, scored = batch.summary.scored, "shard finished");
        output.clean_records.extend(batch.normalized.records);
        output.scored.extend(batch.scored);
        output.aggregation.merge(batch.aggregation);
        output.summary.merge(&batch.summary);
    }
    output.summary.groups = output.aggregation.len();
    Ok(output)
}

/// # Errors
///
/// Returns an error if the input cannot be read, the configuration is
/// invalid, or output cannot be written.
pub(crate) async fn run_batch(
    runtime: &RuntimeConfig,
    config: &PipelineConfig,
    args: &RunArgs,
) -> anyhow::Result<()> {
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();

    let raws = crate::source::read_raw_records(&args.input).await?;
    tracing::info!(
        %run_id,
        input = %args.input.display(),
        records = raws.len(),
        "loaded raw posts"
    );

    // Shards share one engagement scale so their composites stay comparable.
    let scale = EngagementScale::calibrate(&config.signal, raws.iter().map(|r| &r.engagement));
    let shards = shard_by_window(raws, args.shard_hours);

    if args.dry_run {
        let sizes: Vec<String> = shards.iter().map(|s| s.len().to_string()).collect();
        println!(
            "dry-run: would score {} posts in {} shard(s) [{}], grouped by {}, writing to {}",
            shards.iter().map(Vec::len).sum::<usize>(),
            shards.len(),
            sizes.join(", "),
            args.group_by,
            args.output_dir.join(run_id.to_string()).display()
        );
        return Ok(());
    }

    let mut pipeline = Pipeline::new(config, args.group_by).context("building pipeline")?;
    if shards.len() > 1 {
        pipeline = pipeline.with_engagement_scale(scale);
    }
    let aggregator = pipeline.aggregator().clone();

    let mut output = process_shards(pipeline, shards, runtime.max_concurrent_shards).await?;
    let outcome = aggregator.finish(std::mem::take(&mut output.aggregation));
    let top_terms = TermRanker::default().rank(
        output
            .scored
            .iter()
            .map(|s| s.record.normalized_text.as_str()),
    );
    if let Some(first) = top_terms.first() {
        tracing::info!(%run_id, terms = top_terms.len(), top = %first.term, "top terms ranked");
    }
    let report = TradingReport::build(output.scored.iter().map(|s| &s.signal), &outcome.groups)
        .with_top_terms(top_terms);

    let run_dir = args.output_dir.join(run_id.to_string());
    let summary_totals = output.summary.clone();
    let write_dir = run_dir.clone();
    let input = args.input.clone();
    let group_by = args.group_by;
    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        std::fs::create_dir_all(&write_dir)
            .with_context(|| format!("creating {}", write_dir.display()))?;
        sink::write_clean_records(
            &write_dir.join(sink::CLEAN_RECORDS_FILE),
            &output.clean_records,
        )?;
        sink::write_signals(&write_dir.join(sink::SIGNALS_FILE), &output.scored)?;
        sink::write_aggregated(&write_dir.join(sink::AGGREGATED_FILE), &outcome.groups)?;
        sink::write_json(&write_dir.join(sink::REPORT_FILE), &report)?;
        sink::write_json(
            &write_dir.join(sink::SUMMARY_FILE),
            &RunSummary {
                run_id,
                started_at,
                finished_at: Utc::now(),
                input: &input,
                group_by,
                shards: output.shards,
                totals: &output.summary,
                reported_groups: outcome.groups.len(),
                omitted_groups: &outcome.omitted,
            },
        )
    })
    .await
    .context("output writer task failed")??;

    tracing::info!(
        %run_id,
        input = summary_totals.input,
        valid = summary_totals.normalize.valid,
        kept = summary_totals.dedup.kept,
        scored = summary_totals.scored,
        groups = summary_totals.groups,
        output = %run_dir.display(),
        "run complete"
    );
    println!(
        "run {run_id}: scored {} of {} posts into {} group(s); output in {}",
        summary_totals.scored,
        summary_totals.input,
        summary_totals.groups,
        run_dir.display()
    );
    Ok(())
}
