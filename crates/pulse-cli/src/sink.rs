//! Writing run output: Parquet tables plus JSON report and summary.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use arrow_array::{ArrayRef, BooleanArray, Float64Array, RecordBatch, StringArray, UInt64Array};
use arrow_schema::{DataType, Field, Schema};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use pulse_analyzer::ScoredRecord;
use pulse_core::{AggregatedSignal, CleanRecord};
use serde::Serialize;

pub(crate) const CLEAN_RECORDS_FILE: &str = "clean_records.parquet";
pub(crate) const SIGNALS_FILE: &str = "signals.parquet";
pub(crate) const AGGREGATED_FILE: &str = "aggregated.parquet";
pub(crate) const REPORT_FILE: &str = "report.json";
pub(crate) const SUMMARY_FILE: &str = "summary.json";

fn write_parquet(path: &Path, batch: &RecordBatch) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
        .with_context(|| format!("opening parquet writer {}", path.display()))?;
    writer
        .write(batch)
        .with_context(|| format!("writing record batch {}", path.display()))?;
    writer
        .close()
        .with_context(|| format!("closing parquet writer {}", path.display()))?;
    Ok(())
}

fn utf8<'a>(values: impl Iterator<Item = Option<&'a str>>) -> ArrayRef {
    Arc::new(StringArray::from(values.collect::<Vec<_>>()))
}

fn float(values: impl Iterator<Item = f64>) -> ArrayRef {
    Arc::new(Float64Array::from(values.collect::<Vec<_>>()))
}

fn count(values: impl Iterator<Item = u64>) -> ArrayRef {
    Arc::new(UInt64Array::from(values.collect::<Vec<_>>()))
}

fn flag(values: impl Iterator<Item = bool>) -> ArrayRef {
    Arc::new(BooleanArray::from(values.collect::<Vec<_>>()))
}

fn to_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

/// Every normalized record, valid or not.
pub(crate) fn write_clean_records(path: &Path, records: &[CleanRecord]) -> anyhow::Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, true),
        Field::new("author", DataType::Utf8, false),
        Field::new("timestamp", DataType::Utf8, false),
        Field::new("captured_at", DataType::Utf8, false),
        Field::new("text", DataType::Utf8, false),
        Field::new("normalized_text", DataType::Utf8, false),
        Field::new("valid", DataType::Boolean, false),
        Field::new("rejection_reason", DataType::Utf8, true),
        Field::new("likes", DataType::UInt64, false),
        Field::new("shares", DataType::UInt64, false),
        Field::new("replies", DataType::UInt64, false),
        Field::new("views", DataType::UInt64, false),
        Field::new("tags", DataType::Utf8, false),
    ]));

    let timestamps: Vec<String> = records
        .iter()
        .map(|r| r.raw.timestamp.to_rfc3339())
        .collect();
    let captured: Vec<String> = records
        .iter()
        .map(|r| r.raw.captured_at.to_rfc3339())
        .collect();
    let tags: Vec<String> = records.iter().map(|r| r.raw.tags.join(",")).collect();

    let batch = RecordBatch::try_new(
        schema,
        vec![
            utf8(records.iter().map(CleanRecord::id)),
            utf8(records.iter().map(|r| Some(r.raw.author.as_str()))),
            utf8(timestamps.iter().map(|s| Some(s.as_str()))),
            utf8(captured.iter().map(|s| Some(s.as_str()))),
            utf8(records.iter().map(|r| Some(r.raw.text.as_str()))),
            utf8(records.iter().map(|r| Some(r.normalized_text.as_str()))),
            flag(records.iter().map(CleanRecord::is_valid)),
            utf8(records.iter().map(|r| r.rejection.map(|reason| reason.code()))),
            count(records.iter().map(|r| r.raw.engagement.likes)),
            count(records.iter().map(|r| r.raw.engagement.shares)),
            count(records.iter().map(|r| r.raw.engagement.replies)),
            count(records.iter().map(|r| r.raw.engagement.views)),
            utf8(tags.iter().map(|s| Some(s.as_str()))),
        ],
    )
    .context("building clean records batch")?;
    write_parquet(path, &batch)
}

/// One row per scored record: features, components and the composite.
pub(crate) fn write_signals(path: &Path, scored: &[ScoredRecord]) -> anyhow::Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, true),
        Field::new("author", DataType::Utf8, false),
        Field::new("timestamp", DataType::Utf8, false),
        Field::new("group_keys", DataType::Utf8, false),
        Field::new("polarity", DataType::Float64, false),
        Field::new("subjectivity", DataType::Float64, false),
        Field::new("sentiment_label", DataType::Utf8, false),
        Field::new("directional_label", DataType::Utf8, false),
        Field::new("directional_confidence", DataType::Float64, false),
        Field::new("urgency", DataType::Float64, false),
        Field::new("has_numeric_mention", DataType::Boolean, false),
        Field::new("has_percent_mention", DataType::Boolean, false),
        Field::new("token_count", DataType::UInt64, false),
        Field::new("degraded", DataType::Boolean, false),
        Field::new("sentiment_component", DataType::Float64, false),
        Field::new("engagement_component", DataType::Float64, false),
        Field::new("urgency_component", DataType::Float64, false),
        Field::new("technical_component", DataType::Float64, false),
        Field::new("composite", DataType::Float64, false),
        Field::new("strength", DataType::Float64, false),
        Field::new("direction", DataType::Utf8, false),
        Field::new("ci_low", DataType::Float64, false),
        Field::new("ci_high", DataType::Float64, false),
    ]));

    let timestamps: Vec<String> = scored
        .iter()
        .map(|s| s.record.raw.timestamp.to_rfc3339())
        .collect();
    let keys: Vec<String> = scored.iter().map(|s| s.group_keys.join(",")).collect();

    let batch = RecordBatch::try_new(
        schema,
        vec![
            utf8(scored.iter().map(|s| s.record.id())),
            utf8(scored.iter().map(|s| Some(s.record.raw.author.as_str()))),
            utf8(timestamps.iter().map(|s| Some(s.as_str()))),
            utf8(keys.iter().map(|s| Some(s.as_str()))),
            float(scored.iter().map(|s| s.features.polarity)),
            float(scored.iter().map(|s| s.features.subjectivity)),
            utf8(scored.iter().map(|s| Some(s.features.sentiment_label.as_str()))),
            utf8(scored.iter().map(|s| Some(s.features.directional_label.as_str()))),
            float(scored.iter().map(|s| s.features.directional_confidence)),
            float(scored.iter().map(|s| s.features.urgency)),
            flag(scored.iter().map(|s| s.features.has_numeric_mention)),
            flag(scored.iter().map(|s| s.features.has_percent_mention)),
            count(scored.iter().map(|s| to_u64(s.features.token_count))),
            flag(scored.iter().map(|s| s.features.degraded)),
            float(scored.iter().map(|s| s.signal.components.sentiment)),
            float(scored.iter().map(|s| s.signal.components.engagement)),
            float(scored.iter().map(|s| s.signal.components.urgency)),
            float(scored.iter().map(|s| s.signal.components.technical)),
            float(scored.iter().map(|s| s.signal.composite)),
            float(scored.iter().map(|s| s.signal.strength)),
            utf8(scored.iter().map(|s| Some(s.signal.direction.as_str()))),
            float(scored.iter().map(|s| s.signal.confidence_interval.low)),
            float(scored.iter().map(|s| s.signal.confidence_interval.high)),
        ],
    )
    .context("building signals batch")?;
    write_parquet(path, &batch)
}

/// One row per reported group, in key order.
pub(crate) fn write_aggregated(
    path: &Path,
    groups: &BTreeMap<String, AggregatedSignal<String>>,
) -> anyhow::Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("group_key", DataType::Utf8, false),
        Field::new("record_count", DataType::UInt64, false),
        Field::new("mean_signal", DataType::Float64, false),
        Field::new("std_signal", DataType::Float64, false),
        Field::new("mean_strength", DataType::Float64, false),
        Field::new("mean_interval_width", DataType::Float64, false),
        Field::new("bullish", DataType::UInt64, false),
        Field::new("bearish", DataType::UInt64, false),
        Field::new("neutral", DataType::UInt64, false),
        Field::new("recommendation", DataType::Utf8, false),
    ]));

    let rows: Vec<&AggregatedSignal<String>> = groups.values().collect();
    let batch = RecordBatch::try_new(
        schema,
        vec![
            utf8(rows.iter().map(|g| Some(g.group_key.as_str()))),
            count(rows.iter().map(|g| to_u64(g.record_count))),
            float(rows.iter().map(|g| g.mean_signal)),
            float(rows.iter().map(|g| g.std_signal)),
            float(rows.iter().map(|g| g.mean_strength)),
            float(rows.iter().map(|g| g.mean_interval_width)),
            count(rows.iter().map(|g| to_u64(g.distribution.bullish))),
            count(rows.iter().map(|g| to_u64(g.distribution.bearish))),
            count(rows.iter().map(|g| to_u64(g.distribution.neutral))),
            utf8(rows.iter().map(|g| Some(g.recommendation.as_str()))),
        ],
    )
    .context("building aggregated batch")?;
    write_parquet(path, &batch)
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let bytes = serde_json::to_vec_pretty(value)
        .with_context(|| format!("serializing {}", path.display()))?;
    std::fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))
}
