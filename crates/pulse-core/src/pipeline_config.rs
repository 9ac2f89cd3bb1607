//! Pipeline configuration: cleaning toggles, dedup strategies, term lists,
//! signal weights and aggregation thresholds.
//!
//! Every section has documented defaults, so an empty YAML document (or no
//! file at all) yields a working configuration. Values are validated once at
//! startup; components trust a validated config afterwards.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub cleaning: CleaningConfig,
    pub dedup: DedupConfig,
    pub features: FeatureConfig,
    pub signal: SignalConfig,
    pub aggregation: AggregationConfig,
}

/// What the normalizer does with emoji.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmojiMode {
    #[default]
    Keep,
    Drop,
    /// Replace known emoji with a word token such as `rocket`.
    Describe,
}

/// What the normalizer does with `#tag` / `@mention` markers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerMode {
    Keep,
    /// `#nifty50` becomes the plain token `nifty50`.
    #[default]
    StripMarker,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    pub remove_urls: bool,
    pub strip_markup: bool,
    pub hashtags: MarkerMode,
    pub mentions: MarkerMode,
    pub emoji: EmojiMode,
    pub unicode_nfc: bool,
    pub collapse_whitespace: bool,
    pub lowercase: bool,
    /// Mark reshares invalid (reason `reshare`).
    pub drop_reshares: bool,
    /// Raw-text prefixes identifying a reshare.
    pub reshare_prefixes: Vec<String>,
    /// Minimum length, in characters, of the cleaned text.
    pub min_content_length: usize,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            remove_urls: true,
            strip_markup: true,
            hashtags: MarkerMode::StripMarker,
            mentions: MarkerMode::StripMarker,
            emoji: EmojiMode::Keep,
            unicode_nfc: true,
            collapse_whitespace: true,
            lowercase: false,
            drop_reshares: true,
            reshare_prefixes: vec!["RT @".to_string()],
            min_content_length: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Drop records whose platform id was already seen.
    pub identity: bool,
    /// Drop records whose content fingerprint was already seen.
    pub fingerprint: bool,
    /// Include the author in the fingerprint, so identical text from two
    /// authors is not collapsed.
    pub scope_fingerprint_by_author: bool,
    /// Pairwise Jaccard matching. Quadratic in batch size.
    pub fuzzy: bool,
    pub similarity_threshold: f64,
    /// Words per shingle for fuzzy matching; `1` compares plain token sets.
    pub shingle_size: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            identity: true,
            fingerprint: true,
            scope_fingerprint_by_author: false,
            fuzzy: true,
            similarity_threshold: 0.95,
            shingle_size: 1,
        }
    }
}

impl DedupConfig {
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] when the threshold is outside
    /// `(0, 1]` or the shingle size is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.similarity_threshold > 0.0 && self.similarity_threshold <= 1.0) {
            return Err(ConfigError::Validation(format!(
                "dedup.similarity_threshold must be in (0, 1], got {}",
                self.similarity_threshold
            )));
        }
        if self.shingle_size == 0 {
            return Err(ConfigError::Validation(
                "dedup.shingle_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub bullish_terms: Vec<String>,
    pub bearish_terms: Vec<String>,
    pub urgency_terms: Vec<String>,
    /// Directional scores with magnitude below this are labelled neutral.
    pub neutral_epsilon: f64,
    /// Urgency added per `!`.
    pub exclamation_bonus: f64,
}

const BULLISH_TERMS: &[&str] = &[
    "bull", "bullish", "rally", "surge", "soar", "gain", "profit", "high", "breakout",
    "uptrend", "boom", "growth", "positive", "strong", "buy", "moon", "rocket", "pump", "long",
    "support", "bounce", "recovery",
];

const BEARISH_TERMS: &[&str] = &[
    "bear",
    "bearish",
    "crash",
    "dump",
    "fall",
    "drop",
    "loss",
    "low",
    "breakdown",
    "downtrend",
    "decline",
    "negative",
    "weak",
    "sell",
    "short",
    "resistance",
    "correction",
    "panic",
    "fear",
];

const URGENCY_TERMS: &[&str] = &[
    "urgent",
    "now",
    "immediately",
    "breaking",
    "alert",
    "warning",
    "quick",
    "fast",
    "today",
    "asap",
    "hurry",
    "rush",
];

fn owned(terms: &[&str]) -> Vec<String> {
    terms.iter().map(|t| (*t).to_string()).collect()
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            bullish_terms: owned(BULLISH_TERMS),
            bearish_terms: owned(BEARISH_TERMS),
            urgency_terms: owned(URGENCY_TERMS),
            neutral_epsilon: 0.05,
            exclamation_bonus: 0.1,
        }
    }
}

impl FeatureConfig {
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for out-of-range numbers, blank
    /// terms, or a term listed as both bullish and bearish.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("features.neutral_epsilon", self.neutral_epsilon, 0.0, 1.0, false)?;
        check_range("features.exclamation_bonus", self.exclamation_bonus, 0.0, 1.0, true)?;

        for (list, terms) in [
            ("bullish_terms", &self.bullish_terms),
            ("bearish_terms", &self.bearish_terms),
            ("urgency_terms", &self.urgency_terms),
        ] {
            if terms.iter().any(|t| t.trim().is_empty()) {
                return Err(ConfigError::Validation(format!(
                    "features.{list} contains a blank term"
                )));
            }
        }

        let bullish: HashSet<String> = self
            .bullish_terms
            .iter()
            .map(|t| t.trim().to_lowercase())
            .collect();
        let mut overlap: Vec<String> = self
            .bearish_terms
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| bullish.contains(t))
            .collect();
        if !overlap.is_empty() {
            overlap.sort();
            overlap.dedup();
            return Err(ConfigError::Validation(format!(
                "terms listed as both bullish and bearish: {}",
                overlap.join(", ")
            )));
        }
        Ok(())
    }
}

/// Weights of the four sub-signals in the composite score.
///
/// They need not sum to 1. Before clamping, the composite lies in
/// `[-(sentiment + technical), sentiment + engagement + urgency + technical]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalWeights {
    pub sentiment: f64,
    pub engagement: f64,
    pub urgency: f64,
    #[serde(alias = "technical_terms")]
    pub technical: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            sentiment: 0.3,
            engagement: 0.3,
            urgency: 0.2,
            technical: 0.2,
        }
    }
}

impl SignalWeights {
    /// Range of the composite before it is clamped to `[-1, 1]`.
    #[must_use]
    pub fn raw_range(&self) -> (f64, f64) {
        (
            -(self.sentiment + self.technical),
            self.sentiment + self.engagement + self.urgency + self.technical,
        )
    }
}

/// Multipliers applied to each engagement counter before log-dampening.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngagementWeights {
    pub likes: f64,
    pub shares: f64,
    pub replies: f64,
    pub views: f64,
}

impl Default for EngagementWeights {
    fn default() -> Self {
        Self {
            likes: 1.0,
            shares: 2.0,
            replies: 1.5,
            views: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    pub weights: SignalWeights,
    pub engagement_weights: EngagementWeights,
    /// Percentile of the batch's `log1p(engagement)` used as the scale.
    pub engagement_percentile: f64,
    /// Lower bound on a batch-calibrated scale.
    pub engagement_floor: f64,
    /// Scale used before calibration against a batch.
    pub engagement_reference: f64,
    /// Multiplier on the technical component when a number or percent is
    /// mentioned.
    pub numeric_boost: f64,
    pub z_score: f64,
    /// Composites with magnitude below this are labelled neutral.
    pub neutral_band: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            weights: SignalWeights::default(),
            engagement_weights: EngagementWeights::default(),
            engagement_percentile: 0.95,
            engagement_floor: 1.0,
            engagement_reference: 10.0,
            numeric_boost: 1.2,
            z_score: 1.96,
            neutral_band: 0.05,
        }
    }
}

impl SignalConfig {
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] when any weight or scale is out of
    /// range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let w = &self.weights;
        check_range("signal.weights.sentiment", w.sentiment, 0.0, 1.0, true)?;
        check_range("signal.weights.engagement", w.engagement, 0.0, 1.0, true)?;
        check_range("signal.weights.urgency", w.urgency, 0.0, 1.0, true)?;
        check_range("signal.weights.technical", w.technical, 0.0, 1.0, true)?;

        let e = &self.engagement_weights;
        for (name, value) in [
            ("likes", e.likes),
            ("shares", e.shares),
            ("replies", e.replies),
            ("views", e.views),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Validation(format!(
                    "signal.engagement_weights.{name} must be finite and non-negative, got {value}"
                )));
            }
        }

        if !(self.engagement_percentile > 0.0 && self.engagement_percentile <= 1.0) {
            return Err(ConfigError::Validation(format!(
                "signal.engagement_percentile must be in (0, 1], got {}",
                self.engagement_percentile
            )));
        }
        check_positive("signal.engagement_floor", self.engagement_floor)?;
        check_positive("signal.engagement_reference", self.engagement_reference)?;
        check_positive("signal.z_score", self.z_score)?;
        if !self.numeric_boost.is_finite() || self.numeric_boost < 1.0 {
            return Err(ConfigError::Validation(format!(
                "signal.numeric_boost must be at least 1, got {}",
                self.numeric_boost
            )));
        }
        check_range("signal.neutral_band", self.neutral_band, 0.0, 1.0, false)?;
        Ok(())
    }
}

/// Step boundaries mapping a group's mean signal to a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationThresholds {
    pub strong_buy: f64,
    pub buy: f64,
    pub sell: f64,
    pub strong_sell: f64,
}

impl Default for RecommendationThresholds {
    fn default() -> Self {
        Self {
            strong_buy: 0.6,
            buy: 0.3,
            sell: -0.3,
            strong_sell: -0.6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Groups with fewer records are omitted from the output.
    pub min_count: usize,
    pub thresholds: RecommendationThresholds,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            min_count: 5,
            thresholds: RecommendationThresholds::default(),
        }
    }
}

impl AggregationConfig {
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] when `min_count` is zero or the
    /// thresholds are not ordered `strong_sell <= sell < buy <= strong_buy`
    /// within `[-1, 1]`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_count == 0 {
            return Err(ConfigError::Validation(
                "aggregation.min_count must be at least 1".to_string(),
            ));
        }
        let t = &self.thresholds;
        for (name, value) in [
            ("strong_buy", t.strong_buy),
            ("buy", t.buy),
            ("sell", t.sell),
            ("strong_sell", t.strong_sell),
        ] {
            check_range(
                &format!("aggregation.thresholds.{name}"),
                value,
                -1.0,
                1.0,
                true,
            )?;
        }
        if !(t.strong_sell <= t.sell && t.sell < t.buy && t.buy <= t.strong_buy) {
            return Err(ConfigError::Validation(format!(
                "aggregation.thresholds must satisfy strong_sell <= sell < buy <= strong_buy, \
                 got {} / {} / {} / {}",
                t.strong_sell, t.sell, t.buy, t.strong_buy
            )));
        }
        Ok(())
    }
}

impl PipelineConfig {
    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError::Validation`] encountered.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.dedup.validate()?;
        self.features.validate()?;
        self.signal.validate()?;
        self.aggregation.validate()?;
        Ok(())
    }
}

/// Load the pipeline configuration from an optional YAML file, apply
/// `PULSE_*` environment overrides, and validate the result.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file cannot be read or parsed, an override
/// is malformed, or validation fails.
pub fn load_pipeline_config(path: Option<&Path>) -> Result<PipelineConfig, ConfigError> {
    build_pipeline_config(path, |key| std::env::var(key))
}

/// Parse and validate a YAML pipeline configuration without env overrides.
///
/// # Errors
///
/// Returns [`ConfigError`] on parse or validation failure.
pub fn parse_pipeline_config(yaml: &str) -> Result<PipelineConfig, ConfigError> {
    let config = parse_yaml(yaml)?;
    config.validate()?;
    Ok(config)
}

fn parse_yaml(yaml: &str) -> Result<PipelineConfig, ConfigError> {
    if yaml.trim().is_empty() {
        return Ok(PipelineConfig::default());
    }
    Ok(serde_yaml::from_str(yaml)?)
}

fn build_pipeline_config<F>(path: Option<&Path>, lookup: F) -> Result<PipelineConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let mut config = match path {
        Some(path) => {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::ConfigFileIo {
                    path: path.display().to_string(),
                    source: e,
                })?;
            parse_yaml(&content)?
        }
        None => PipelineConfig::default(),
    };

    apply_env_overrides(&mut config, lookup)?;
    config.validate()?;
    Ok(config)
}

fn apply_env_overrides<F>(config: &mut PipelineConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    fn parse_var<T>(var: &str, raw: &str) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    }

    if let Ok(raw) = lookup("PULSE_MIN_CONTENT_LENGTH") {
        config.cleaning.min_content_length = parse_var("PULSE_MIN_CONTENT_LENGTH", &raw)?;
    }
    if let Ok(raw) = lookup("PULSE_DROP_RESHARES") {
        config.cleaning.drop_reshares = parse_flag("PULSE_DROP_RESHARES", &raw)?;
    }
    if let Ok(raw) = lookup("PULSE_FUZZY_DEDUP") {
        config.dedup.fuzzy = parse_flag("PULSE_FUZZY_DEDUP", &raw)?;
    }
    if let Ok(raw) = lookup("PULSE_SIMILARITY_THRESHOLD") {
        config.dedup.similarity_threshold = parse_var("PULSE_SIMILARITY_THRESHOLD", &raw)?;
    }
    if let Ok(raw) = lookup("PULSE_AGG_MIN_COUNT") {
        config.aggregation.min_count = parse_var("PULSE_AGG_MIN_COUNT", &raw)?;
    }
    Ok(())
}

fn parse_flag(var: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: format!("expected a boolean, got '{other}'"),
        }),
    }
}

fn check_range(
    name: &str,
    value: f64,
    min: f64,
    max: f64,
    max_inclusive: bool,
) -> Result<(), ConfigError> {
    let upper_ok = if max_inclusive { value <= max } else { value < max };
    if value.is_finite() && value >= min && upper_ok {
        Ok(())
    } else {
        let close = if max_inclusive { ']' } else { ')' };
        Err(ConfigError::Validation(format!(
            "{name} must be in [{min}, {max}{close}, got {value}"
        )))
    }
}

fn check_positive(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "{name} must be positive, got {value}"
        )))
    }
}

#[cfg(test)]
#[path = "pipeline_config_test.rs"]
mod tests;
