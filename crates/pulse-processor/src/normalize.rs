//! Per-record text canonicalization and validation.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use pulse_core::{CleanRecord, CleaningConfig, EmojiMode, MarkerMode, RawRecord, RejectionReason};
use regex::Regex;
use serde::Serialize;
use unicode_normalization::UnicodeNormalization;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)</?[a-z][a-z0-9-]*(?:\s[^<>]*)?/?>").expect("valid tag regex")
});

static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)&(?:amp|lt|gt|quot|apos|nbsp|#39|#x27);").expect("valid entity regex")
});

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:https?://|www\.)\S+").expect("valid url regex"));

static HASHTAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|[^\w#&])#+(\w+)").expect("valid hashtag regex"));

static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|[^\w@])@+(\w+)").expect("valid mention regex"));

/// Emoji with a word rendering in [`EmojiMode::Describe`].
const EMOJI_TOKENS: &[(char, &str)] = &[
    ('🚀', "rocket"),
    ('📈', "chart_increasing"),
    ('📉', "chart_decreasing"),
    ('💰', "money"),
    ('🔥', "fire"),
    ('👍', "thumbs_up"),
    ('👎', "thumbs_down"),
    ('⚠', "warning"),
];

const VARIATION_SELECTOR: char = '\u{FE0F}';
const ZERO_WIDTH_JOINER: char = '\u{200D}';

/// Turns [`RawRecord`]s into [`CleanRecord`]s under one [`CleaningConfig`].
///
/// Purely per-record: no state is carried between calls, so a single
/// normalizer can be shared across threads.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    config: CleaningConfig,
}

/// Rejection counts for one normalized batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeSummary {
    pub total: usize,
    pub valid: usize,
    pub rejected: BTreeMap<RejectionReason, usize>,
}

impl NormalizeSummary {
    #[must_use]
    pub fn rejected_total(&self) -> usize {
        self.rejected.values().sum()
    }

    /// Add another batch's counts to this one.
    pub fn merge(&mut self, other: &NormalizeSummary) {
        self.total += other.total;
        self.valid += other.valid;
        for (reason, count) in &other.rejected {
            *self.rejected.entry(*reason).or_default() += count;
        }
    }

    /// Fraction of the batch marked invalid; `0.0` for an empty batch.
    #[must_use]
    pub fn rejection_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let rate = self.rejected_total() as f64 / self.total as f64;
        rate
    }
}

#[derive(Debug, Clone)]
pub struct NormalizeOutcome {
    /// One entry per input record, in input order, valid or not.
    pub records: Vec<CleanRecord>,
    pub summary: NormalizeSummary,
}

impl NormalizeOutcome {
    pub fn valid(&self) -> impl Iterator<Item = &CleanRecord> {
        self.records.iter().filter(|r| r.is_valid())
    }
}

impl Normalizer {
    #[must_use]
    pub fn new(config: CleaningConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &CleaningConfig {
        &self.config
    }

    /// Clean one record and decide whether it is usable.
    ///
    /// Invalid records are returned with a [`RejectionReason`] rather than
    /// dropped.
    #[must_use]
    pub fn normalize(&self, raw: &RawRecord) -> CleanRecord {
        let normalized_text = self.clean_text(&raw.text);
        let rejection = self.rejection_for(&raw.text, &normalized_text);
        CleanRecord {
            raw: raw.clone(),
            normalized_text,
            rejection,
        }
    }

    /// Normalize every record of a batch, counting rejections by reason.
    #[must_use]
    pub fn normalize_batch(&self, raws: &[RawRecord]) -> NormalizeOutcome {
        let mut summary = NormalizeSummary {
            total: raws.len(),
            ..NormalizeSummary::default()
        };

        let records: Vec<CleanRecord> = raws
            .iter()
            .map(|raw| {
                let record = self.normalize(raw);
                match record.rejection {
                    Some(reason) => {
                        tracing::debug!(
                            record = %record.label(),
                            reason = %reason,
                            "record rejected"
                        );
                        *summary.rejected.entry(reason).or_insert(0) += 1;
                    }
                    None => summary.valid += 1,
                }
                record
            })
            .collect();

        tracing::info!(
            total = summary.total,
            valid = summary.valid,
            rejected = summary.rejected_total(),
            "normalization complete"
        );

        NormalizeOutcome { records, summary }
    }

    /// Apply the configured cleaning steps to a piece of text.
    ///
    /// Applying this to its own output returns the output unchanged.
    #[must_use]
    pub fn clean_text(&self, text: &str) -> String {
        let cfg = &self.config;
        // Stripping one marker can expose another (`#@x`). Every pass that
        // changes the text shortens it, so this settles.
        let mut out = text.to_string();
        loop {
            let next = self.strip_structure(&out);
            if next == out {
                break;
            }
            out = next;
        }

        out = match cfg.emoji {
            EmojiMode::Keep => out,
            EmojiMode::Drop => drop_emoji(&out),
            EmojiMode::Describe => describe_emoji(&out),
        };
        if cfg.lowercase {
            out = out.to_lowercase();
        }
        if cfg.unicode_nfc {
            out = out.nfc().collect();
        }
        if cfg.collapse_whitespace {
            out = out.split_whitespace().collect::<Vec<_>>().join(" ");
        }
        out
    }

    fn strip_structure(&self, text: &str) -> String {
        let cfg = &self.config;
        let mut out = apply_marker_mode(&HASHTAG_RE, text, cfg.hashtags);
        out = apply_marker_mode(&MENTION_RE, &out, cfg.mentions);
        if cfg.strip_markup {
            out = strip_markup(&out);
        }
        if cfg.remove_urls {
            out = URL_RE.replace_all(&out, " ").into_owned();
        }
        out
    }

    /// Whether the raw text starts with one of the configured reshare
    /// prefixes (e.g. `RT @`).
    #[must_use]
    pub fn is_reshare(&self, raw_text: &str) -> bool {
        let trimmed = raw_text.trim_start();
        self.config
            .reshare_prefixes
            .iter()
            .any(|prefix| !prefix.is_empty() && trimmed.starts_with(prefix.as_str()))
    }

    /// Whether cleaned text still reads as a reshare. Cleaning turns
    /// `RT @trader:` into `RT trader:`, so each prefix is cleaned too, its
    /// trailing markers dropped, and matched as a whole word.
    #[must_use]
    pub fn is_cleaned_reshare(&self, cleaned: &str) -> bool {
        let trimmed = cleaned.trim_start();
        self.config.reshare_prefixes.iter().any(|prefix| {
            let cleaned_prefix = self.clean_text(prefix);
            let stem = cleaned_prefix
                .trim_end_matches(|c: char| c == '@' || c == '#' || c.is_whitespace());
            !stem.is_empty()
                && trimmed
                    .strip_prefix(stem)
                    .is_some_and(|rest| !rest.starts_with(is_word_char))
        })
    }

    fn rejection_for(&self, raw_text: &str, cleaned: &str) -> Option<RejectionReason> {
        let reshare = self.is_reshare(raw_text) || self.is_cleaned_reshare(cleaned);
        if self.config.drop_reshares && reshare {
            return Some(RejectionReason::Reshare);
        }
        if cleaned.trim().is_empty() {
            return Some(RejectionReason::Empty);
        }
        if cleaned.chars().count() < self.config.min_content_length {
            return Some(RejectionReason::TooShort);
        }
        if !cleaned.chars().any(char::is_alphanumeric) {
            return Some(RejectionReason::NoAlphanumeric);
        }
        None
    }
}

/// Entity decoding can expose new tags (`&lt;b&gt;`), so stripping repeats
/// until nothing changes. Each changing pass shortens the text.
fn strip_markup(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let no_tags = TAG_RE.replace_all(&current, " ");
        let decoded = ENTITY_RE
            .replace_all(&no_tags, |caps: &regex::Captures<'_>| {
                decode_entity(&caps[0]).to_string()
            })
            .into_owned();
        if decoded == current {
            break;
        }
        current = decoded;
    }
    current
}

fn decode_entity(entity: &str) -> &'static str {
    match entity.to_ascii_lowercase().as_str() {
        "&amp;" => "&",
        "&lt;" => "<",
        "&gt;" => ">",
        "&quot;" => "\"",
        "&apos;" | "&#39;" | "&#x27;" => "'",
        _ => " ",
    }
}

fn apply_marker_mode(re: &Regex, text: &str, mode: MarkerMode) -> String {
    match mode {
        MarkerMode::Keep => text.to_string(),
        MarkerMode::StripMarker => re.replace_all(text, "${1}${2}").into_owned(),
        MarkerMode::Remove => re.replace_all(text, "${1} ").into_owned(),
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_emoji(c: char) -> bool {
    matches!(
        u32::from(c),
        0x1F000..=0x1FAFF | 0x2600..=0x27BF | 0x2B00..=0x2BFF | 0xFE0F | 0xE0020..=0xE007F
    )
}

fn drop_emoji(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    for (i, &c) in chars.iter().enumerate() {
        if is_emoji(c) {
            out.push(' ');
            continue;
        }
        if c == ZERO_WIDTH_JOINER {
            let prev_emoji = i > 0 && is_emoji(chars[i - 1]);
            let next_emoji = chars.get(i + 1).is_some_and(|n| is_emoji(*n));
            if prev_emoji || next_emoji {
                continue;
            }
        }
        out.push(c);
    }
    out
}

fn describe_emoji(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut after_described = false;
    for c in text.chars() {
        if after_described && c == VARIATION_SELECTOR {
            continue;
        }
        match EMOJI_TOKENS.iter().find(|(emoji, _)| *emoji == c) {
            Some((_, token)) => {
                out.push(' ');
                out.push_str(token);
                out.push(' ');
                after_described = true;
            }
            None => {
                out.push(c);
                after_described = false;
            }
        }
    }
    out
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
