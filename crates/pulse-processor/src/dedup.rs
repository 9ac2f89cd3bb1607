//! Batch deduplication by platform id, content fingerprint and Jaccard
//! similarity, applied in that order.

use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap, HashSet};

use pulse_core::{CleanRecord, ConfigError, DedupConfig};
use serde::Serialize;

use crate::disjoint_set::DisjointSet;
use crate::fingerprint::ContentFingerprint;
use crate::similarity::{jaccard, jaccard_upper_bound, token_set};

/// Which stage matched a record to its representative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupStrategy {
    Identity,
    Fingerprint,
    Fuzzy,
}

impl DedupStrategy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DedupStrategy::Identity => "identity",
            DedupStrategy::Fingerprint => "fingerprint",
            DedupStrategy::Fuzzy => "fuzzy",
        }
    }
}

/// A record removed from the batch. `index` is its position in the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AbsorbedRecord {
    pub index: usize,
    pub id: Option<String>,
    pub matched_by: DedupStrategy,
}

/// A kept record and every record folded into it, transitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    pub representative_index: usize,
    pub representative_id: Option<String>,
    /// Sorted by input position.
    pub absorbed: Vec<AbsorbedRecord>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DedupSummary {
    pub input: usize,
    pub kept: usize,
    pub identity_duplicates: usize,
    pub fingerprint_duplicates: usize,
    pub fuzzy_duplicates: usize,
    pub previously_seen: usize,
}

impl DedupSummary {
    #[must_use]
    pub fn removed(&self) -> usize {
        self.input - self.kept
    }

    /// Add another batch's counts to this one.
    pub fn merge(&mut self, other: &DedupSummary) {
        self.input += other.input;
        self.kept += other.kept;
        self.identity_duplicates += other.identity_duplicates;
        self.fingerprint_duplicates += other.fingerprint_duplicates;
        self.fuzzy_duplicates += other.fuzzy_duplicates;
        self.previously_seen += other.previously_seen;
    }
}

#[derive(Debug, Clone)]
pub struct DedupOutcome {
    /// Surviving records in input order.
    pub kept: Vec<CleanRecord>,
    /// Input position of each entry in `kept`.
    pub kept_indices: Vec<usize>,
    /// One entry per kept record that absorbed at least one other, ordered by
    /// representative position.
    pub groups: Vec<DuplicateGroup>,
    /// Records matching a [`SeenIndex`] from an earlier batch.
    pub previously_seen: Vec<AbsorbedRecord>,
    pub summary: DedupSummary,
}

/// Ids and fingerprints of records kept by earlier batches.
///
/// Owned by the caller and threaded through
/// [`Deduplicator::deduplicate_against`] to deduplicate an unbounded stream
/// one batch at a time. Fuzzy matching is never run against it.
#[derive(Debug, Clone, Default)]
pub struct SeenIndex {
    ids: HashSet<String>,
    fingerprints: HashSet<ContentFingerprint>,
}

impl SeenIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains_id(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    #[must_use]
    pub fn contains_fingerprint(&self, fingerprint: &ContentFingerprint) -> bool {
        self.fingerprints.contains(fingerprint)
    }

    /// Number of remembered fingerprints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty() && self.ids.is_empty()
    }

    fn remember(&mut self, record: &CleanRecord, fingerprint: ContentFingerprint) {
        if let Some(id) = record.id() {
            self.ids.insert(id.to_string());
        }
        self.fingerprints.insert(fingerprint);
    }
}

#[derive(Debug, Clone)]
pub struct Deduplicator {
    config: DedupConfig,
}

/// Working state for one batch. Indices are input positions.
struct Pass<'a> {
    records: &'a [CleanRecord],
    alive: Vec<usize>,
    absorbed: HashMap<usize, Vec<AbsorbedRecord>>,
    fingerprints: Vec<ContentFingerprint>,
    summary: DedupSummary,
}

impl<'a> Pass<'a> {
    fn new(records: &'a [CleanRecord], scope_by_author: bool) -> Self {
        Self {
            records,
            alive: (0..records.len()).collect(),
            absorbed: HashMap::new(),
            fingerprints: records
                .iter()
                .map(|r| ContentFingerprint::of_record(r, scope_by_author))
                .collect(),
            summary: DedupSummary {
                input: records.len(),
                ..DedupSummary::default()
            },
        }
    }

    /// Fold `dup` (and whatever it already absorbed) into `rep`.
    fn absorb(&mut self, rep: usize, dup: usize, matched_by: DedupStrategy) {
        let mut moved = self.absorbed.remove(&dup).unwrap_or_default();
        let entry = self.absorbed.entry(rep).or_default();
        entry.push(AbsorbedRecord {
            index: dup,
            id: self.records[dup].raw.id.clone(),
            matched_by,
        });
        entry.append(&mut moved);
        match matched_by {
            DedupStrategy::Identity => self.summary.identity_duplicates += 1,
            DedupStrategy::Fingerprint => self.summary.fingerprint_duplicates += 1,
            DedupStrategy::Fuzzy => self.summary.fuzzy_duplicates += 1,
        }
    }

    fn finish(mut self) -> DedupOutcome {
        let kept: Vec<CleanRecord> = self
            .alive
            .iter()
            .map(|&i| self.records[i].clone())
            .collect();

        let mut groups: Vec<DuplicateGroup> = self
            .absorbed
            .drain()
            .map(|(rep, mut absorbed)| {
                absorbed.sort_by_key(|a| a.index);
                DuplicateGroup {
                    representative_index: rep,
                    representative_id: self.records[rep].raw.id.clone(),
                    absorbed,
                }
            })
            .collect();
        groups.sort_by_key(|g| g.representative_index);

        self.summary.kept = kept.len();
        DedupOutcome {
            kept,
            kept_indices: self.alive,
            groups,
            previously_seen: Vec::new(),
            summary: self.summary,
        }
    }
}

impl Deduplicator {
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if the config is out of range.
    pub fn new(config: DedupConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    /// Remove duplicates from one batch.
    ///
    /// Output depends only on the input order and configuration. Ties are
    /// always broken by input position.
    #[must_use]
    pub fn deduplicate(&self, records: &[CleanRecord]) -> DedupOutcome {
        let mut pass = Pass::new(records, self.config.scope_fingerprint_by_author);
        self.run_stages(&mut pass);
        let outcome = pass.finish();
        log_outcome(&outcome);
        outcome
    }

    /// Like [`Self::deduplicate`], but first drops records whose id or
    /// fingerprint is already in `seen`, then remembers what this batch kept.
    pub fn deduplicate_against(
        &self,
        records: &[CleanRecord],
        seen: &mut SeenIndex,
    ) -> DedupOutcome {
        let mut pass = Pass::new(records, self.config.scope_fingerprint_by_author);

        let mut previously_seen = Vec::new();
        pass.alive.retain(|&i| {
            let record = &records[i];
            let id_hit =
                self.config.identity && record.id().is_some_and(|id| seen.contains_id(id));
            let fp_hit =
                self.config.fingerprint && seen.contains_fingerprint(&pass.fingerprints[i]);
            if id_hit || fp_hit {
                previously_seen.push(AbsorbedRecord {
                    index: i,
                    id: record.raw.id.clone(),
                    matched_by: if id_hit {
                        DedupStrategy::Identity
                    } else {
                        DedupStrategy::Fingerprint
                    },
                });
                false
            } else {
                true
            }
        });
        pass.summary.previously_seen = previously_seen.len();

        self.run_stages(&mut pass);
        for &i in &pass.alive {
            seen.remember(&records[i], pass.fingerprints[i]);
        }

        let mut outcome = pass.finish();
        outcome.previously_seen = previously_seen;
        log_outcome(&outcome);
        outcome
    }

    fn run_stages(&self, pass: &mut Pass<'_>) {
        if self.config.identity {
            identity_stage(pass);
        }
        if self.config.fingerprint {
            fingerprint_stage(pass);
        }
        if self.config.fuzzy {
            self.fuzzy_stage(pass);
        }
    }

    /// Connected components of the "similarity >= threshold" relation over
    /// the surviving records. The earliest-captured member of each component
    /// survives.
    fn fuzzy_stage(&self, pass: &mut Pass<'_>) {
        let n = pass.alive.len();
        if n < 2 {
            return;
        }

        let sets: Vec<BTreeSet<String>> = pass
            .alive
            .iter()
            .map(|&i| token_set(&pass.records[i].normalized_text, self.config.shingle_size))
            .collect();

        let threshold = self.config.similarity_threshold;
        let mut forest = DisjointSet::new(n);
        for a in 0..n {
            for b in (a + 1)..n {
                if jaccard_upper_bound(sets[a].len(), sets[b].len()) < threshold {
                    continue;
                }
                if jaccard(&sets[a], &sets[b]) >= threshold {
                    forest.union(a, b);
                }
            }
        }

        let mut removed: HashSet<usize> = HashSet::new();
        for component in forest.groups() {
            if component.len() < 2 {
                continue;
            }
            let members: Vec<usize> = component
                .iter()
                .map(|&local| pass.alive[local])
                .collect();
            let Some(&rep) = members
                .iter()
                .min_by_key(|&&i| (pass.records[i].raw.captured_at, i))
            else {
                continue;
            };
            for &member in &members {
                if member != rep {
                    pass.absorb(rep, member, DedupStrategy::Fuzzy);
                    removed.insert(member);
                }
            }
        }
        pass.alive.retain(|i| !removed.contains(i));
    }
}

fn identity_stage(pass: &mut Pass<'_>) {
    let records = pass.records;
    let mut first_by_id: HashMap<&str, usize> = HashMap::new();
    let mut survivors = Vec::with_capacity(pass.alive.len());
    let alive = std::mem::take(&mut pass.alive);
    for i in alive {
        let Some(id) = records[i].id() else {
            survivors.push(i);
            continue;
        };
        match first_by_id.entry(id) {
            Entry::Occupied(rep) => {
                let rep = *rep.get();
                pass.absorb(rep, i, DedupStrategy::Identity);
            }
            Entry::Vacant(slot) => {
                slot.insert(i);
                survivors.push(i);
            }
        }
    }
    pass.alive = survivors;
}

fn fingerprint_stage(pass: &mut Pass<'_>) {
    let mut first_by_fp: HashMap<ContentFingerprint, usize> = HashMap::new();
    let mut survivors = Vec::with_capacity(pass.alive.len());
    let alive = std::mem::take(&mut pass.alive);
    for i in alive {
        match first_by_fp.entry(pass.fingerprints[i]) {
            Entry::Occupied(rep) => {
                let rep = *rep.get();
                pass.absorb(rep, i, DedupStrategy::Fingerprint);
            }
            Entry::Vacant(slot) => {
                slot.insert(i);
                survivors.push(i);
            }
        }
    }
    pass.alive = survivors;
}

fn log_outcome(outcome: &DedupOutcome) {
    let s = &outcome.summary;
    tracing::info!(
        input = s.input,
        kept = s.kept,
        removed = s.removed(),
        identity = s.identity_duplicates,
        fingerprint = s.fingerprint_duplicates,
        fuzzy = s.fuzzy_duplicates,
        previously_seen = s.previously_seen,
        "deduplication complete"
    );
}

#[cfg(test)]
#[path = "dedup_test.rs"]
mod tests;
