//! Composite signal scoring.

use pulse_core::{
    CleanRecord, ConfidenceInterval, ConfigError, Direction, Engagement, EngagementWeights,
    FeatureVector, Signal, SignalComponents, SignalConfig,
};

/// Weighted engagement before dampening, e.g. `likes + 2·shares + 1.5·replies`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn weighted_engagement(engagement: &Engagement, weights: &EngagementWeights) -> f64 {
    engagement.likes as f64 * weights.likes
        + engagement.shares as f64 * weights.shares
        + engagement.replies as f64 * weights.replies
        + engagement.views as f64 * weights.views
}

/// Divisor mapping `log1p(weighted engagement)` into `[0, 1]`.
///
/// Calibrated to a high percentile of a batch rather than its maximum, so a
/// single viral post saturates at `1.0` instead of flattening everyone else.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngagementScale(f64);

impl EngagementScale {
    /// The uncalibrated reference scale.
    #[must_use]
    pub fn reference(config: &SignalConfig) -> Self {
        Self(config.engagement_reference)
    }

    /// Percentile of `log1p(weighted engagement)` over the batch, never below
    /// the configured floor. An empty batch yields the reference scale.
    ///
    /// The index is `floor(p * (n - 1))` over the sorted values, so with a
    /// percentile below 1 the largest value never sets the scale once the
    /// batch has two or more records.
    #[must_use]
    pub fn calibrate<'a, I>(config: &SignalConfig, engagements: I) -> Self
    where
        I: IntoIterator<Item = &'a Engagement>,
    {
        let mut dampened: Vec<f64> = engagements
            .into_iter()
            .map(|e| weighted_engagement(e, &config.engagement_weights).ln_1p())
            .collect();
        if dampened.is_empty() {
            return Self::reference(config);
        }
        dampened.sort_by(f64::total_cmp);

        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let idx = (config.engagement_percentile * (dampened.len() - 1) as f64).floor() as usize;
        let idx = idx.min(dampened.len() - 1);
        Self(dampened[idx].max(config.engagement_floor))
    }

    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }

    /// `log1p(weighted) / scale`, capped at 1.
    #[must_use]
    pub fn normalize(self, weighted: f64) -> f64 {
        if weighted.is_nan() || weighted <= 0.0 {
            return 0.0;
        }
        (weighted.ln_1p() / self.0).min(1.0)
    }
}

/// Folds a record's features and engagement into a bounded [`Signal`].
///
/// Component ranges: sentiment and technical in `[-1, 1]`, engagement and
/// urgency in `[0, 1]`. The composite is their weighted sum clamped to
/// `[-1, 1]`; see [`pulse_core::SignalWeights::raw_range`] for the range
/// before clamping.
#[derive(Debug, Clone)]
pub struct SignalGenerator {
    config: SignalConfig,
    scale: EngagementScale,
}

impl SignalGenerator {
    /// Generator using the reference engagement scale.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if weights or scales are out of
    /// range.
    pub fn new(config: SignalConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let scale = EngagementScale::reference(&config);
        Ok(Self { config, scale })
    }

    #[must_use]
    pub fn with_scale(mut self, scale: EngagementScale) -> Self {
        self.scale = scale;
        self
    }

    /// A copy of this generator whose engagement scale is calibrated to
    /// `records`.
    #[must_use]
    pub fn calibrated(&self, records: &[CleanRecord]) -> Self {
        let scale =
            EngagementScale::calibrate(&self.config, records.iter().map(|r| &r.raw.engagement));
        tracing::debug!(
            scale = scale.value(),
            records = records.len(),
            "engagement scale calibrated"
        );
        self.clone().with_scale(scale)
    }

    #[must_use]
    pub fn scale(&self) -> EngagementScale {
        self.scale
    }

    #[must_use]
    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    #[must_use]
    pub fn generate(&self, record: &CleanRecord, features: &FeatureVector) -> Signal {
        let components = self.components(&record.raw.engagement, features);
        let w = &self.config.weights;

        let raw = w.sentiment * components.sentiment
            + w.engagement * components.engagement
            + w.urgency * components.urgency
            + w.technical * components.technical;
        let composite = clamp_unit(raw);

        // Uncertainty falls with engagement and rises with subjectivity.
        let uncertainty = 0.5 * (1.0 - components.engagement)
            + 0.5 * finite_or(features.subjectivity, 0.5).clamp(0.0, 1.0);
        let standard_error = 0.5 * uncertainty;
        let half_width = self.config.z_score * standard_error;

        Signal {
            composite,
            strength: composite.abs(),
            direction: Direction::from_score(composite, self.config.neutral_band),
            confidence_interval: ConfidenceInterval {
                low: clamp_unit(composite - half_width),
                high: clamp_unit(composite + half_width),
            },
            components,
        }
    }

    fn components(&self, engagement: &Engagement, features: &FeatureVector) -> SignalComponents {
        let label_sign = features.directional_label.sign();
        let confidence = finite_or(features.directional_confidence, 0.0).clamp(0.0, 1.0);

        let sentiment =
            clamp_unit(0.4 * finite_or(features.polarity, 0.0) + 0.6 * label_sign * confidence);

        let engagement = self
            .scale
            .normalize(weighted_engagement(engagement, &self.config.engagement_weights));

        let urgency = finite_or(features.urgency, 0.0).clamp(0.0, 1.0);

        let boost = if features.has_numeric_mention || features.has_percent_mention {
            self.config.numeric_boost
        } else {
            1.0
        };
        let technical = clamp_unit(label_sign * confidence * boost);

        SignalComponents {
            sentiment,
            engagement,
            urgency,
            technical,
        }
    }
}

fn clamp_unit(x: f64) -> f64 {
    finite_or(x, 0.0).clamp(-1.0, 1.0)
}

fn finite_or(x: f64, default: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        default
    }
}

#[cfg(test)]
#[path = "signal_test.rs"]
mod tests;
