//! Assigning records to aggregation keys.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::{DateTime, TimeZone, Utc};
use pulse_core::CleanRecord;
use regex::Regex;
use serde::{Deserialize, Serialize};

static RAW_HASHTAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#(\w+)").expect("valid hashtag regex"));

const HOUR_SECS: i64 = 3_600;
const DAY_SECS: i64 = 86_400;

/// How scored records are keyed for aggregation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    /// One key per topic tag; a record with several tags joins several groups.
    #[default]
    Tag,
    Hour,
    Day,
}

impl GroupBy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            GroupBy::Tag => "tag",
            GroupBy::Hour => "hour",
            GroupBy::Day => "day",
        }
    }

    /// Keys `record` contributes to. May be empty for [`GroupBy::Tag`].
    #[must_use]
    pub fn keys(self, record: &CleanRecord) -> Vec<String> {
        match self {
            GroupBy::Tag => tag_keys(record),
            GroupBy::Hour => vec![time_bucket(record.raw.timestamp, HOUR_SECS)
                .format("%Y-%m-%dT%H:00:00Z")
                .to_string()],
            GroupBy::Day => vec![record.raw.timestamp.format("%Y-%m-%d").to_string()],
        }
    }
}

impl std::fmt::Display for GroupBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GroupBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tag" | "hashtag" => Ok(GroupBy::Tag),
            "hour" | "hourly" => Ok(GroupBy::Hour),
            "day" | "daily" => Ok(GroupBy::Day),
            other => Err(format!("unknown grouping '{other}': expected tag, hour or day")),
        }
    }
}

/// Lowercased tags without the leading `#`, deduplicated and sorted.
///
/// Uses the collector's tags when present, otherwise scans the raw text for
/// `#word` markers.
#[must_use]
pub fn tag_keys(record: &CleanRecord) -> Vec<String> {
    let from_collector: BTreeSet<String> = record
        .raw
        .tags
        .iter()
        .filter_map(|t| canonical_tag(t))
        .collect();
    if !from_collector.is_empty() {
        return from_collector.into_iter().collect();
    }

    RAW_HASHTAG_RE
        .captures_iter(&record.raw.text)
        .filter_map(|c| c.get(1).and_then(|m| canonical_tag(m.as_str())))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn canonical_tag(tag: &str) -> Option<String> {
    let trimmed = tag.trim().trim_start_matches('#').trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Start of the `width_secs`-wide window containing `ts`, aligned to the
/// Unix epoch. A non-positive width returns `ts` unchanged.
#[must_use]
pub fn time_bucket(ts: DateTime<Utc>, width_secs: i64) -> DateTime<Utc> {
    if width_secs <= 0 {
        return ts;
    }
    let start = ts.timestamp().div_euclid(width_secs) * width_secs;
    Utc.timestamp_opt(start, 0).single().unwrap_or(ts)
}

/// Window width for a [`GroupBy`] time grouping.
#[must_use]
pub fn bucket_width(group_by: GroupBy) -> Option<i64> {
    match group_by {
        GroupBy::Tag => None,
        GroupBy::Hour => Some(HOUR_SECS),
        GroupBy::Day => Some(DAY_SECS),
    }
}
