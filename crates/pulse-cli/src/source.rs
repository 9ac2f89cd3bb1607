//! Reading raw post batches written by the collector.
//!
//! Accepts a JSON array of posts or JSON Lines. A post that fails to decode
//! is logged and skipped so one bad line does not lose the batch.

use std::path::Path;

use anyhow::Context;
use pulse_core::RawRecord;

/// # Errors
///
/// Returns an error if the file cannot be read or is not a JSON array or
/// JSON Lines document.
pub(crate) async fn read_raw_records(path: &Path) -> anyhow::Result<Vec<RawRecord>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    parse_raw_records(&text).with_context(|| format!("parsing {}", path.display()))
}

pub(crate) fn parse_raw_records(text: &str) -> anyhow::Result<Vec<RawRecord>> {
    if text.trim_start().starts_with('[') {
        let values: Vec<serde_json::Value> =
            serde_json::from_str(text).context("decoding JSON array of posts")?;
        return Ok(values
            .into_iter()
            .enumerate()
            .filter_map(|(i, value)| decode(serde_json::from_value(value), i))
            .collect());
    }

    Ok(text
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(i, line)| decode(serde_json::from_str(line), i))
        .collect())
}

fn decode(result: serde_json::Result<RawRecord>, position: usize) -> Option<RawRecord> {
    match result {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!(position = position + 1, error = %e, "skipping malformed post");
            None
        }
    }
}
