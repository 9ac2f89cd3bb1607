use chrono::{Duration, TimeZone, Utc};
use pulse_core::{Engagement, RawRecord};

use super::*;

fn record(id: Option<&str>, author: &str, text: &str, minute: i64) -> CleanRecord {
    let base = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
    CleanRecord {
        raw: RawRecord {
            id: id.map(str::to_string),
            author: author.to_string(),
            timestamp: base,
            text: text.to_string(),
            engagement: Engagement::default(),
            tags: vec![],
            mentions: vec![],
            captured_at: base + Duration::minutes(minute),
        },
        normalized_text: text.to_string(),
        rejection: None,
    }
}

fn dedup(config: DedupConfig) -> Deduplicator {
    Deduplicator::new(config).unwrap()
}

fn default_dedup() -> Deduplicator {
    dedup(DedupConfig::default())
}

fn ids(records: &[CleanRecord]) -> Vec<&str> {
    records.iter().map(|r| r.id().unwrap_or("-")).collect()
}

#[test]
fn rejects_invalid_config() {
    let config = DedupConfig {
        similarity_threshold: 1.5,
        ..DedupConfig::default()
    };
    assert!(matches!(
        Deduplicator::new(config),
        Err(ConfigError::Validation(_))
    ));
}

#[test]
fn empty_batch() {
    let outcome = default_dedup().deduplicate(&[]);
    assert!(outcome.kept.is_empty());
    assert!(outcome.groups.is_empty());
    assert_eq!(outcome.summary.input, 0);
}

#[test]
fn identity_keeps_first_occurrence() {
    let batch = vec![
        record(Some("a"), "u1", "nifty breaking out today", 0),
        record(Some("b"), "u2", "banknifty weak into expiry", 1),
        record(Some("a"), "u1", "nifty breaking out today (edited)", 2),
    ];
    let outcome = default_dedup().deduplicate(&batch);
    assert_eq!(ids(&outcome.kept), vec!["a", "b"]);
    assert_eq!(outcome.kept_indices, vec![0, 1]);
    assert_eq!(outcome.groups.len(), 1);
    let group = &outcome.groups[0];
    assert_eq!(group.representative_index, 0);
    assert_eq!(group.absorbed[0].index, 2);
    assert_eq!(group.absorbed[0].matched_by, DedupStrategy::Identity);
    assert_eq!(outcome.summary.identity_duplicates, 1);
}

#[test]
fn exact_copy_keeps_exactly_one() {
    let batch = vec![
        record(Some("a"), "u1", "Sensex to rally 2% this week", 0),
        record(Some("b"), "u2", "Sensex to rally 2% this week", 1),
    ];
    let outcome = default_dedup().deduplicate(&batch);
    assert_eq!(outcome.kept.len(), 1);
    assert_eq!(ids(&outcome.kept), vec!["a"]);
    assert_eq!(outcome.groups[0].absorbed.len(), 1);
    assert_eq!(outcome.groups[0].absorbed[0].id.as_deref(), Some("b"));
    assert_eq!(
        outcome.groups[0].absorbed[0].matched_by,
        DedupStrategy::Fingerprint
    );
}

#[test]
fn fingerprint_ignores_case_and_punctuation() {
    let batch = vec![
        record(Some("1"), "u1", "nifty50 breaking out buy now", 0),
        record(Some("2"), "u2", "Nifty50 Breaking Out, BUY NOW!!", 1),
    ];
    let outcome = default_dedup().deduplicate(&batch);
    assert_eq!(ids(&outcome.kept), vec!["1"]);
    assert_eq!(outcome.summary.fingerprint_duplicates, 1);
}

#[test]
fn author_scoped_fingerprints_keep_both_authors() {
    let batch = vec![
        record(Some("1"), "alice", "nifty50 breaking out buy now", 0),
        record(Some("2"), "bob", "nifty50 breaking out buy now", 1),
        record(Some("3"), "alice", "Nifty50 breaking out, buy now", 2),
    ];
    let outcome = dedup(DedupConfig {
        scope_fingerprint_by_author: true,
        fuzzy: false,
        ..DedupConfig::default()
    })
    .deduplicate(&batch);
    assert_eq!(ids(&outcome.kept), vec!["1", "2"]);
}

#[test]
fn records_without_ids_fall_through_to_fingerprint() {
    let batch = vec![
        record(None, "u1", "gold breaking out above resistance", 0),
        record(None, "u2", "gold breaking out above resistance", 1),
        record(None, "u3", "silver looking weak", 2),
    ];
    let outcome = default_dedup().deduplicate(&batch);
    assert_eq!(outcome.kept_indices, vec![0, 2]);
    assert_eq!(outcome.groups[0].representative_id, None);
}

#[test]
fn identity_absorptions_move_with_fingerprint_merge() {
    let batch = vec![
        record(Some("a"), "u1", "crude oil rally continues strongly", 0),
        record(Some("b"), "u2", "crude oil rally continues strongly", 1),
        record(Some("b"), "u2", "crude oil rally continues strongly", 2),
    ];
    let outcome = default_dedup().deduplicate(&batch);
    assert_eq!(outcome.kept_indices, vec![0]);
    assert_eq!(outcome.groups.len(), 1);
    let absorbed: Vec<(usize, DedupStrategy)> = outcome.groups[0]
        .absorbed
        .iter()
        .map(|a| (a.index, a.matched_by))
        .collect();
    assert_eq!(
        absorbed,
        vec![(1, DedupStrategy::Fingerprint), (2, DedupStrategy::Identity)]
    );
}

fn words(n: usize, prefix: &str) -> Vec<String> {
    (0..n).map(|i| format!("{prefix}{i}")).collect()
}

/// Three texts where A~B and B~C at threshold 0.95 but A≁C:
/// J(A, B) = 40/41, J(B, C) = 40/42, J(A, C) = 39/42.
fn chain_texts() -> (String, String, String) {
    let common = words(39, "w");
    let a = [common.clone(), vec!["alpha".to_string()]].concat();
    let b = [
        common.clone(),
        vec!["alpha".to_string(), "beta".to_string()],
    ]
    .concat();
    let c = [common, vec!["beta".to_string(), "gamma".to_string()]].concat();
    (a.join(" "), b.join(" "), c.join(" "))
}

#[test]
fn chain_fixture_is_transitive_only() {
    let (a, b, c) = chain_texts();
    let (a, b, c) = (token_set(&a, 1), token_set(&b, 1), token_set(&c, 1));
    assert!(jaccard(&a, &b) >= 0.95);
    assert!(jaccard(&b, &c) >= 0.95);
    assert!(jaccard(&a, &c) < 0.95);
}

#[test]
fn fuzzy_groups_are_transitive() {
    let (a, b, c) = chain_texts();
    let batch = vec![
        record(Some("a"), "u1", &a, 0),
        record(Some("b"), "u2", &b, 1),
        record(Some("c"), "u3", &c, 2),
        record(Some("d"), "u4", "completely unrelated post about rupee", 3),
    ];
    let outcome = default_dedup().deduplicate(&batch);
    assert_eq!(ids(&outcome.kept), vec!["a", "d"]);
    assert_eq!(outcome.groups.len(), 1);
    let absorbed: Vec<usize> = outcome.groups[0]
        .absorbed
        .iter()
        .map(|a| a.index)
        .collect();
    assert_eq!(absorbed, vec![1, 2]);
    assert!(outcome.groups[0]
        .absorbed
        .iter()
        .all(|a| a.matched_by == DedupStrategy::Fuzzy));
    assert_eq!(outcome.summary.fuzzy_duplicates, 2);
}

#[test]
fn fuzzy_representative_is_earliest_captured() {
    let (a, b, c) = chain_texts();
    let batch = vec![
        record(Some("a"), "u1", &a, 30),
        record(Some("b"), "u2", &b, 5),
        record(Some("c"), "u3", &c, 10),
    ];
    let outcome = default_dedup().deduplicate(&batch);
    assert_eq!(ids(&outcome.kept), vec!["b"]);
    assert_eq!(outcome.groups[0].representative_index, 1);
}

#[test]
fn fuzzy_capture_time_ties_break_by_position() {
    let (a, b, _) = chain_texts();
    let batch = vec![
        record(Some("x"), "u1", &b, 7),
        record(Some("y"), "u2", &a, 7),
    ];
    let outcome = default_dedup().deduplicate(&batch);
    assert_eq!(ids(&outcome.kept), vec!["x"]);
}

#[test]
fn fuzzy_can_be_disabled() {
    let (a, b, c) = chain_texts();
    let batch = vec![
        record(Some("a"), "u1", &a, 0),
        record(Some("b"), "u2", &b, 1),
        record(Some("c"), "u3", &c, 2),
    ];
    let outcome = dedup(DedupConfig {
        fuzzy: false,
        ..DedupConfig::default()
    })
    .deduplicate(&batch);
    assert_eq!(outcome.kept.len(), 3);
    assert!(outcome.groups.is_empty());
}

#[test]
fn lower_threshold_catches_near_duplicates() {
    let batch = vec![
        record(Some("1"), "u1", "nifty breaking out buy now", 0),
        record(Some("2"), "u2", "nifty breaking out buy right now", 1),
    ];
    let strict = default_dedup().deduplicate(&batch);
    assert_eq!(strict.kept.len(), 2);

    let loose = dedup(DedupConfig {
        similarity_threshold: 0.8,
        ..DedupConfig::default()
    })
    .deduplicate(&batch);
    assert_eq!(ids(&loose.kept), vec!["1"]);
}

#[test]
fn deduplicate_is_deterministic() {
    let (a, b, c) = chain_texts();
    let batch = vec![
        record(Some("1"), "u1", &c, 4),
        record(Some("2"), "u2", "gold breaking out above resistance", 1),
        record(Some("3"), "u3", &a, 3),
        record(None, "u4", "gold breaking out above resistance", 0),
        record(Some("1"), "u1", "edited", 9),
        record(Some("5"), "u5", &b, 2),
    ];
    let first = default_dedup().deduplicate(&batch);
    for _ in 0..10 {
        let again = default_dedup().deduplicate(&batch);
        assert_eq!(again.kept, first.kept);
        assert_eq!(again.kept_indices, first.kept_indices);
        assert_eq!(again.groups, first.groups);
    }
}

#[test]
fn every_input_is_kept_or_absorbed_exactly_once() {
    let (a, b, c) = chain_texts();
    let batch = vec![
        record(Some("1"), "u1", &a, 0),
        record(Some("1"), "u1", &a, 1),
        record(Some("2"), "u2", &b, 2),
        record(Some("3"), "u3", &c, 3),
        record(Some("4"), "u4", "gold breaking out above resistance", 4),
        record(Some("5"), "u5", "Gold: breaking out above resistance!", 5),
    ];
    let outcome = default_dedup().deduplicate(&batch);
    let mut seen: Vec<usize> = outcome.kept_indices.clone();
    for group in &outcome.groups {
        seen.extend(group.absorbed.iter().map(|a| a.index));
    }
    seen.sort_unstable();
    assert_eq!(seen, (0..batch.len()).collect::<Vec<_>>());
    assert_eq!(outcome.summary.removed(), 4);
}

#[test]
fn seen_index_carries_across_batches() {
    let d = default_dedup();
    let mut seen = SeenIndex::new();

    let first = vec![
        record(Some("a"), "u1", "nifty breaking out today", 0),
        record(Some("b"), "u2", "banknifty weak into expiry", 1),
    ];
    let out1 = d.deduplicate_against(&first, &mut seen);
    assert_eq!(out1.kept.len(), 2);
    assert!(out1.previously_seen.is_empty());
    assert_eq!(seen.len(), 2);
    assert!(seen.contains_id("a"));

    let second = vec![
        record(Some("a"), "u1", "nifty breaking out today", 5),
        record(Some("z"), "u9", "Banknifty weak into expiry!", 6),
        record(Some("c"), "u3", "crude oil rally continues", 7),
    ];
    let out2 = d.deduplicate_against(&second, &mut seen);
    assert_eq!(ids(&out2.kept), vec!["c"]);
    assert_eq!(out2.summary.previously_seen, 2);
    assert_eq!(out2.previously_seen[0].matched_by, DedupStrategy::Identity);
    assert_eq!(out2.previously_seen[1].matched_by, DedupStrategy::Fingerprint);
    assert!(seen.contains_id("c"));
    assert!(!seen.contains_id("z"));
}

#[test]
fn empty_seen_index_matches_plain_deduplicate() {
    let batch = vec![
        record(Some("1"), "u1", "nifty50 breaking out buy now", 0),
        record(Some("2"), "u2", "Nifty50 Breaking Out, BUY NOW!!", 1),
    ];
    let d = default_dedup();
    let plain = d.deduplicate(&batch);
    let mut seen = SeenIndex::new();
    assert!(seen.is_empty());
    let incremental = d.deduplicate_against(&batch, &mut seen);
    assert_eq!(plain.kept, incremental.kept);
    assert_eq!(plain.groups, incremental.groups);
}
