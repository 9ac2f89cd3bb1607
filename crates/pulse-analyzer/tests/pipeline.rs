use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use pulse_analyzer::{
    AnalyzerError, EngagementScale, GroupBy, Pipeline, SentimentScore, SentimentScorer,
    TermRanker, TradingReport, TOP_TERMS,
};
use pulse_core::{
    Direction, Engagement, PipelineConfig, RawRecord, Recommendation, RejectionReason,
};
use pulse_processor::SeenIndex;

fn raw(id: &str, text: &str, tags: &[&str], minute: i64, likes: u64) -> RawRecord {
    let base = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
    RawRecord {
        id: Some(id.to_string()),
        author: format!("user_{id}"),
        timestamp: base + Duration::minutes(minute),
        text: text.to_string(),
        engagement: Engagement {
            likes,
            shares: likes / 10,
            replies: likes / 20,
            views: likes * 30,
        },
        tags: tags.iter().map(ToString::to_string).collect(),
        mentions: vec![],
        captured_at: base + Duration::minutes(minute + 5),
    }
}

fn nifty_posts() -> Vec<RawRecord> {
    vec![
        raw("n1", "nifty rally continues, strong breakout above 22000", &["#nifty50"], 0, 120),
        raw("n2", "banks leading the surge, expecting more gain this week", &["#nifty50"], 7, 40),
        raw("n3", "bullish on nifty, buying every dip for the bounce", &["#Nifty50"], 15, 3),
        raw("n4", "index at record high, momentum looks strong", &["#nifty50"], 31, 800),
        raw("n5", "recovery rally in midcaps, profit booking unlikely", &["#nifty50"], 48, 0),
        raw("n6", "uptrend intact, support holding near 21800", &["#nifty50"], 66, 15),
    ]
}

fn gold_posts() -> Vec<RawRecord> {
    vec![
        raw("g1", "gold crash incoming, dealers are nervous", &["#gold"], 3, 10),
        raw("g2", "gold weak again, panic selling everywhere", &["#gold"], 9, 25),
    ]
}

fn pipeline() -> Pipeline {
    Pipeline::new(&PipelineConfig::default(), GroupBy::Tag).unwrap()
}

struct OfflineScorer;

impl SentimentScorer for OfflineScorer {
    fn score(&self, _text: &str) -> Result<SentimentScore, AnalyzerError> {
        Err(AnalyzerError::Scorer("model offline".to_string()))
    }
}

#[test]
fn full_batch_counts_every_outcome() {
    let mut batch = nifty_posts();
    batch.extend(gold_posts());
    batch.push(raw(
        "dup",
        "Nifty rally continues; STRONG breakout above 22000!",
        &["#nifty50"],
        70,
        5,
    ));
    batch.push(raw("rt", "RT @trader: nifty rally continues", &["#nifty50"], 71, 0));
    batch.push(raw("short", "buy!", &["#nifty50"], 72, 0));

    let p = pipeline();
    let result = p.run(&batch);
    let s = &result.summary;

    assert_eq!(s.input, 11);
    assert_eq!(s.normalize.valid, 9);
    assert_eq!(s.normalize.rejected.get(&RejectionReason::Reshare), Some(&1));
    assert_eq!(s.normalize.rejected.get(&RejectionReason::TooShort), Some(&1));
    assert_eq!(s.dedup.kept, 8);
    assert_eq!(s.dedup.fingerprint_duplicates, 1);
    assert_eq!(s.scored, 8);
    assert_eq!(s.degraded, 0);
    assert_eq!(s.extraction_failures, 0);
    assert_eq!(s.ungrouped, 0);
    assert_eq!(s.groups, 2);

    assert_eq!(result.dedup.groups.len(), 1);
    assert_eq!(result.dedup.groups[0].representative_id.as_deref(), Some("n1"));

    let outcome = p.aggregator().finish(result.aggregation);
    let nifty = &outcome.groups["nifty50"];
    assert_eq!(nifty.record_count, 6);
    assert!(nifty.mean_signal > 0.0, "mean {}", nifty.mean_signal);
    assert_eq!(nifty.distribution.bearish, 0);
    assert!(nifty.recommendation >= Recommendation::Hold);

    assert!(!outcome.groups.contains_key("gold"));
    assert_eq!(outcome.omitted.len(), 1);
    assert_eq!(outcome.omitted[0].key, "gold");
    assert_eq!(outcome.omitted[0].record_count, 2);
}

#[test]
fn every_signal_is_bounded() {
    let mut batch = nifty_posts();
    batch.extend(gold_posts());
    batch.push(raw("v", "URGENT!!! breaking: sell now, crash alert!!!", &["#gold"], 80, 5_000_000));

    let result = pipeline().run(&batch);
    assert_eq!(result.scored.len(), 9);
    for scored in &result.scored {
        let sig = &scored.signal;
        assert!((-1.0..=1.0).contains(&sig.composite), "{sig:?}");
        assert!((sig.strength - sig.composite.abs()).abs() < f64::EPSILON);
        let ci = sig.confidence_interval;
        assert!(-1.0 <= ci.low && ci.low <= ci.high && ci.high <= 1.0, "{ci:?}");
        assert!(ci.contains(sig.composite));
    }

    let alert = result
        .scored
        .iter()
        .find(|s| s.record.id() == Some("v"))
        .unwrap();
    assert!(alert.signal.components.sentiment < 0.0);
    assert!(alert.signal.components.technical < 0.0);
    assert!((alert.signal.components.urgency - 1.0).abs() < f64::EPSILON);
}

#[test]
fn neutral_zero_engagement_record_scores_zero() {
    let batch = vec![raw("z", "the committee meets on thursday afternoon", &[], 0, 0)];
    let result = pipeline().run(&batch);

    assert_eq!(result.scored.len(), 1);
    let sig = &result.scored[0].signal;
    assert!(sig.composite.abs() < f64::EPSILON, "composite {}", sig.composite);
    assert_eq!(sig.direction, Direction::Neutral);
    assert_eq!(result.summary.ungrouped, 1);
    assert!(result.aggregation.is_empty());
}

#[test]
fn repeated_runs_are_identical() {
    let mut batch = nifty_posts();
    batch.extend(gold_posts());
    let p = pipeline();

    let first = p.run(&batch);
    let second = p.run(&batch);
    assert_eq!(first.dedup.kept_indices, second.dedup.kept_indices);
    assert_eq!(first.dedup.groups, second.dedup.groups);
    assert_eq!(first.scored, second.scored);
    assert_eq!(first.summary, second.summary);
}

#[test]
fn merged_shards_match_unsharded_run() {
    let mut batch = nifty_posts();
    batch.extend(gold_posts());
    let scale = EngagementScale::reference(&PipelineConfig::default().signal);
    let p = pipeline().with_engagement_scale(scale);

    let whole = p.aggregator().finish(p.run(&batch).aggregation);

    let (left, right) = batch.split_at(4);
    let mut merged = p.run(left).aggregation;
    merged.merge(p.run(right).aggregation);
    let sharded = p.aggregator().finish(merged);

    let (a, b) = (&whole.groups["nifty50"], &sharded.groups["nifty50"]);
    assert_eq!(a.record_count, b.record_count);
    assert!((a.mean_signal - b.mean_signal).abs() < 1e-12);
    assert_eq!(a.distribution, b.distribution);
    assert_eq!(a.recommendation, b.recommendation);
    assert_eq!(whole.omitted, sharded.omitted);
}

#[test]
fn scorer_failure_degrades_instead_of_aborting() {
    let p = Pipeline::with_scorer(&PipelineConfig::default(), GroupBy::Tag, Arc::new(OfflineScorer))
        .unwrap();
    let result = p.run(&nifty_posts());

    assert_eq!(result.summary.scored, 6);
    assert_eq!(result.summary.degraded, 6);
    for scored in &result.scored {
        assert!(scored.features.degraded);
        assert!(scored.features.polarity.abs() < f64::EPSILON);
        assert!((scored.features.subjectivity - 0.5).abs() < f64::EPSILON);
    }
}

#[test]
fn incremental_runs_skip_records_seen_before() {
    let p = pipeline();
    let mut seen = SeenIndex::new();

    let first = p.run_incremental(&nifty_posts(), &mut seen);
    assert_eq!(first.summary.scored, 6);
    assert_eq!(seen.len(), 6);

    let mut next = nifty_posts();
    next.extend(gold_posts());
    let second = p.run_incremental(&next, &mut seen);
    assert_eq!(second.summary.dedup.previously_seen, 6);
    assert_eq!(second.summary.scored, 2);
    assert_eq!(seen.len(), 8);
}

#[test]
fn hourly_grouping_buckets_by_timestamp() {
    let p = Pipeline::new(&PipelineConfig::default(), GroupBy::Hour).unwrap();
    let result = p.run(&nifty_posts());
    let outcome = p.aggregator().aggregate_with_min(
        result
            .scored
            .iter()
            .flat_map(|s| s.group_keys.iter().map(|k| (k.clone(), s.signal.clone()))),
        1,
    );

    assert_eq!(outcome.groups["2024-03-01T09:00:00Z"].record_count, 5);
    assert_eq!(outcome.groups["2024-03-01T10:00:00Z"].record_count, 1);
}

#[test]
fn report_summarizes_scored_batch() {
    let mut batch = nifty_posts();
    batch.extend(gold_posts());
    let p = pipeline();
    let result = p.run(&batch);
    let outcome = p.aggregator().finish(result.aggregation.clone());

    let terms = TermRanker::default().rank(
        result
            .scored
            .iter()
            .map(|s| s.record.normalized_text.as_str()),
    );
    let report = TradingReport::build(result.scored.iter().map(|s| &s.signal), &outcome.groups)
        .with_top_terms(terms);
    assert_eq!(report.total_records, 8);
    assert_eq!(report.top_terms.len(), TOP_TERMS);
    assert!(report.top_terms.iter().all(|t| t.term != "the" && t.score > 0.0));
    assert!(report
        .top_terms
        .windows(2)
        .all(|w| w[0].score >= w[1].score));
    assert_eq!(report.distribution.total(), 8);
    assert_eq!(report.top_groups.len(), 1);
    assert_eq!(report.top_groups[0].key, "nifty50");
    let pct = report.bullish_pct + report.bearish_pct + report.neutral_pct;
    assert!((pct - 100.0).abs() < 1e-9);
}
