use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Engagement counters captured alongside a post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Engagement {
    #[serde(default, deserialize_with = "deserialize_count")]
    pub likes: u64,
    /// Reshares of the post (retweets / reposts).
    #[serde(default, alias = "retweets", deserialize_with = "deserialize_count")]
    pub shares: u64,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub replies: u64,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub views: u64,
}

/// A post exactly as the collector produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Platform id. `None` when the collector could not supply a trusted one.
    #[serde(default)]
    pub id: Option<String>,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub text: String,
    #[serde(default)]
    pub engagement: Engagement,
    /// Topic tags extracted by the collector, e.g. `"#nifty50"`.
    #[serde(default, alias = "hashtags")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub mentions: Vec<String>,
    #[serde(alias = "scraped_at")]
    pub captured_at: DateTime<Utc>,
}

/// Why a record was marked invalid by the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    Empty,
    TooShort,
    NoAlphanumeric,
    Reshare,
}

impl RejectionReason {
    /// Stable reason code used in reports and sinks.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            RejectionReason::Empty => "empty",
            RejectionReason::TooShort => "too_short",
            RejectionReason::NoAlphanumeric => "no_alphanumeric",
            RejectionReason::Reshare => "reshare",
        }
    }
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// A [`RawRecord`] plus its canonical text.
///
/// `normalized_text` carries no raw URLs, is NFC-normalized and has
/// collapsed whitespace (under the default cleaning configuration).
/// Invalid records are kept with a reason so callers can report rejection
/// rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanRecord {
    pub raw: RawRecord,
    pub normalized_text: String,
    pub rejection: Option<RejectionReason>,
}

impl CleanRecord {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.rejection.is_none()
    }

    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.raw.id.as_deref()
    }

    /// Human-readable handle for logs: the platform id when present,
    /// otherwise `author@timestamp`.
    #[must_use]
    pub fn label(&self) -> String {
        match &self.raw.id {
            Some(id) => id.clone(),
            None => format!("{}@{}", self.raw.author, self.raw.timestamp.to_rfc3339()),
        }
    }
}

/// Parses an engagement count as rendered by the platform UI.
///
/// Handles thousands separators and `K`/`M`/`B` suffixes (`"1.2K"` → 1200).
/// Empty strings, `"-"` and anything unparseable yield `0`.
#[must_use]
pub fn parse_engagement_count(text: &str) -> u64 {
    let cleaned = text.trim().replace(',', "").to_uppercase();
    if cleaned.is_empty() || cleaned == "-" {
        return 0;
    }

    let suffix_multiplier = match cleaned.chars().last() {
        Some('K') => Some(1_000.0),
        Some('M') => Some(1_000_000.0),
        Some('B') => Some(1_000_000_000.0),
        _ => None,
    };

    let Some(multiplier) = suffix_multiplier else {
        return cleaned
            .parse::<u64>()
            .ok()
            .or_else(|| {
                cleaned
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite() && *v > 0.0)
                    .map(to_count)
            })
            .unwrap_or(0);
    };

    let number = &cleaned[..cleaned.len() - 1];
    match number.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => to_count(value * multiplier),
        _ => 0,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_count(value: f64) -> u64 {
    value.round() as u64
}

fn deserialize_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Integer(u64),
        Float(f64),
        Text(String),
    }

    Ok(match Count::deserialize(deserializer)? {
        Count::Integer(n) => n,
        Count::Float(f) if f.is_finite() && f > 0.0 => to_count(f),
        Count::Float(_) => 0,
        Count::Text(s) => parse_engagement_count(&s),
    })
}
