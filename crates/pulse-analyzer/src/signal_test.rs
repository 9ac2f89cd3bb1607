use chrono::{TimeZone, Utc};
use pulse_core::{RawRecord, SentimentLabel};

use super::*;

fn record_with(engagement: Engagement) -> CleanRecord {
    let ts = Utc.with_ymd_and_hms(2024, 3, 1, 9, 15, 0).unwrap();
    CleanRecord {
        raw: RawRecord {
            id: Some("t1".to_string()),
            author: "trader".to_string(),
            timestamp: ts,
            text: "placeholder text".to_string(),
            engagement,
            tags: vec![],
            mentions: vec![],
            captured_at: ts,
        },
        normalized_text: "placeholder text".to_string(),
        rejection: None,
    }
}

fn engagement(likes: u64, shares: u64, replies: u64) -> Engagement {
    Engagement {
        likes,
        shares,
        replies,
        views: 0,
    }
}

fn neutral_features() -> FeatureVector {
    FeatureVector {
        polarity: 0.0,
        subjectivity: 0.0,
        sentiment_label: SentimentLabel::Neutral,
        directional_label: Direction::Neutral,
        directional_confidence: 0.0,
        urgency: 0.0,
        has_numeric_mention: false,
        has_percent_mention: false,
        token_count: 5,
        bullish_matches: 0,
        bearish_matches: 0,
        degraded: false,
    }
}

fn generator() -> SignalGenerator {
    SignalGenerator::new(SignalConfig::default()).unwrap()
}

#[test]
fn all_zero_input_is_neutral_zero() {
    let signal = generator().generate(&record_with(Engagement::default()), &neutral_features());
    assert!(signal.composite.abs() < f64::EPSILON);
    assert_eq!(signal.direction, Direction::Neutral);
    assert!(signal.strength.abs() < f64::EPSILON);
    assert!(signal.confidence_interval.contains(0.0));
}

#[test]
fn weighted_engagement_uses_configured_weights() {
    let w = EngagementWeights::default();
    let total = weighted_engagement(&engagement(10, 5, 2), &w);
    assert!((total - 23.0).abs() < 1e-12);
}

#[test]
fn engagement_component_is_log_dampened() {
    let g = generator();
    let features = neutral_features();
    let low = g.generate(&record_with(engagement(10, 0, 0)), &features);
    let high = g.generate(&record_with(engagement(1000, 0, 0)), &features);
    assert!(low.components.engagement > 0.0);
    assert!(high.components.engagement > low.components.engagement);
    // Reference scale 10: log1p(10) / 10.
    assert!((low.components.engagement - 11_f64.ln() / 10.0).abs() < 1e-12);
}

#[test]
fn viral_outlier_does_not_flatten_the_batch() {
    let config = SignalConfig::default();
    let mut batch: Vec<Engagement> = (1..=40).map(|i| engagement(i * 10, i, 0)).collect();
    batch.push(engagement(10_000_000, 500_000, 20_000));

    let scale = EngagementScale::calibrate(&config, batch.iter());
    let viral = scale.normalize(weighted_engagement(&batch[40], &config.engagement_weights));
    let typical = scale.normalize(weighted_engagement(&batch[20], &config.engagement_weights));
    assert!((viral - 1.0).abs() < f64::EPSILON);
    assert!(typical > 0.8, "typical post squashed to {typical}");

    // Dividing by the max instead would push typical posts far lower.
    let max_scale = weighted_engagement(&batch[40], &config.engagement_weights).ln_1p();
    let typical_by_max =
        weighted_engagement(&batch[20], &config.engagement_weights).ln_1p() / max_scale;
    assert!(typical > typical_by_max);
}

#[test]
fn single_viral_post_does_not_set_a_small_batch_scale() {
    let config = SignalConfig::default();
    let mut batch = vec![engagement(100, 0, 0); 10];
    batch.push(engagement(10_000_000, 0, 0));

    let scale = EngagementScale::calibrate(&config, batch.iter());
    assert!((scale.value() - 101_f64.ln()).abs() < 1e-12);
    let typical = scale.normalize(weighted_engagement(&batch[0], &config.engagement_weights));
    assert!((typical - 1.0).abs() < 1e-12, "typical post squashed to {typical}");

    let quiet = EngagementScale::calibrate(&config, batch[..10].iter());
    assert!((quiet.value() - scale.value()).abs() < 1e-12);
}

#[test]
fn two_record_batch_scales_to_the_smaller() {
    let config = SignalConfig::default();
    let batch = [engagement(50, 0, 0), engagement(5_000_000, 0, 0)];
    let scale = EngagementScale::calibrate(&config, batch.iter());
    assert!((scale.value() - 51_f64.ln()).abs() < 1e-12);

    let single = EngagementScale::calibrate(&config, batch[1..].iter());
    assert!((single.value() - 5_000_001_f64.ln()).abs() < 1e-9);
}

#[test]
fn full_percentile_uses_the_maximum() {
    let config = SignalConfig {
        engagement_percentile: 1.0,
        ..SignalConfig::default()
    };
    let batch = [engagement(50, 0, 0), engagement(500, 0, 0)];
    let scale = EngagementScale::calibrate(&config, batch.iter());
    assert!((scale.value() - 501_f64.ln()).abs() < 1e-12);
}

#[test]
fn calibration_respects_floor_and_empty_batches() {
    let config = SignalConfig::default();
    let zeros = vec![Engagement::default(); 5];
    let scale = EngagementScale::calibrate(&config, zeros.iter());
    assert!((scale.value() - config.engagement_floor).abs() < f64::EPSILON);

    let empty: Vec<Engagement> = Vec::new();
    let scale = EngagementScale::calibrate(&config, empty.iter());
    assert!((scale.value() - config.engagement_reference).abs() < f64::EPSILON);
}

#[test]
fn sentiment_component_mixes_polarity_and_direction() {
    let features = FeatureVector {
        polarity: 0.5,
        directional_label: Direction::Bearish,
        directional_confidence: 0.5,
        ..neutral_features()
    };
    let signal = generator().generate(&record_with(Engagement::default()), &features);
    // 0.4 * 0.5 + 0.6 * -1 * 0.5
    assert!((signal.components.sentiment + 0.1).abs() < 1e-12);
}

#[test]
fn technical_component_is_signed_and_boosted() {
    let bullish = FeatureVector {
        directional_label: Direction::Bullish,
        directional_confidence: 0.5,
        ..neutral_features()
    };
    let g = generator();
    let plain = g.generate(&record_with(Engagement::default()), &bullish);
    assert!((plain.components.technical - 0.5).abs() < 1e-12);

    let with_number = FeatureVector {
        has_percent_mention: true,
        ..bullish.clone()
    };
    let boosted = g.generate(&record_with(Engagement::default()), &with_number);
    assert!((boosted.components.technical - 0.6).abs() < 1e-12);

    let bearish = FeatureVector {
        directional_label: Direction::Bearish,
        has_numeric_mention: true,
        directional_confidence: 1.0,
        ..neutral_features()
    };
    let capped = g.generate(&record_with(Engagement::default()), &bearish);
    assert!((capped.components.technical + 1.0).abs() < f64::EPSILON);
}

#[test]
fn composite_is_weighted_sum() {
    let features = FeatureVector {
        polarity: 0.5,
        directional_label: Direction::Bullish,
        directional_confidence: 0.5,
        urgency: 0.4,
        ..neutral_features()
    };
    let signal = generator().generate(&record_with(Engagement::default()), &features);
    // sentiment 0.5, engagement 0, urgency 0.4, technical 0.5
    let expected = 0.3 * 0.5 + 0.2 * 0.4 + 0.2 * 0.5;
    assert!((signal.composite - expected).abs() < 1e-12);
    assert_eq!(signal.direction, Direction::Bullish);
}

#[test]
fn heavy_weights_are_clamped() {
    let mut config = SignalConfig::default();
    config.weights.sentiment = 1.0;
    config.weights.engagement = 1.0;
    config.weights.urgency = 1.0;
    config.weights.technical = 1.0;
    let g = SignalGenerator::new(config).unwrap();
    let features = FeatureVector {
        polarity: 1.0,
        subjectivity: 1.0,
        directional_label: Direction::Bullish,
        directional_confidence: 1.0,
        urgency: 1.0,
        has_numeric_mention: true,
        ..neutral_features()
    };
    let signal = g.generate(&record_with(engagement(u64::MAX, u64::MAX, u64::MAX)), &features);
    assert!((signal.composite - 1.0).abs() < f64::EPSILON);
    assert!(signal.confidence_interval.high <= 1.0);
}

#[test]
fn interval_narrows_with_engagement_and_objectivity() {
    let g = generator();
    let subjective = FeatureVector {
        subjectivity: 1.0,
        ..neutral_features()
    };
    let quiet = g.generate(&record_with(Engagement::default()), &subjective);
    let busy = g.generate(&record_with(engagement(50_000, 0, 0)), &subjective);
    let objective = g.generate(&record_with(Engagement::default()), &neutral_features());

    assert!(busy.confidence_interval.width() < quiet.confidence_interval.width());
    assert!(objective.confidence_interval.width() < quiet.confidence_interval.width());
    // Fully uncertain: half-width 1.96 * 0.5 * 1.0.
    assert!((quiet.confidence_interval.width() - 1.96).abs() < 1e-12);
}

#[test]
fn signals_stay_bounded_over_a_grid() {
    let g = generator();
    let labels = [Direction::Bullish, Direction::Bearish, Direction::Neutral];
    let values = [0.0, 0.25, 0.5, 0.75, 1.0];
    let engagements = [
        Engagement::default(),
        engagement(3, 1, 0),
        engagement(5_000, 800, 120),
        engagement(u64::MAX, 0, 0),
    ];
    for label in labels {
        for &p in &values {
            for &s in &values {
                for &u in &values {
                    for e in &engagements {
                        let features = FeatureVector {
                            polarity: p * 2.0 - 1.0,
                            subjectivity: s,
                            directional_label: label,
                            directional_confidence: u,
                            urgency: u,
                            has_numeric_mention: s > 0.5,
                            ..neutral_features()
                        };
                        let signal = g.generate(&record_with(*e), &features);
                        assert!((-1.0..=1.0).contains(&signal.composite));
                        assert!((0.0..=1.0).contains(&signal.strength));
                        let ci = signal.confidence_interval;
                        assert!(ci.low <= ci.high);
                        assert!(ci.low >= -1.0 && ci.high <= 1.0);
                    }
                }
            }
        }
    }
}

#[test]
fn rejects_invalid_weights() {
    let mut config = SignalConfig::default();
    config.weights.engagement = -0.1;
    assert!(matches!(
        SignalGenerator::new(config),
        Err(ConfigError::Validation(_))
    ));
}
