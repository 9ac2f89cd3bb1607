//! Record cleaning and batch deduplication.
//!
//! [`Normalizer`] turns each raw post into a [`pulse_core::CleanRecord`];
//! [`Deduplicator`] removes repeats from a batch of clean records by platform
//! id, content fingerprint, and (optionally) Jaccard similarity.

pub mod dedup;
pub mod disjoint_set;
pub mod fingerprint;
pub mod normalize;
pub mod similarity;

pub use dedup::{
    AbsorbedRecord, DedupOutcome, DedupStrategy, DedupSummary, Deduplicator, DuplicateGroup,
    SeenIndex,
};
pub use disjoint_set::DisjointSet;
pub use fingerprint::ContentFingerprint;
pub use normalize::{NormalizeOutcome, NormalizeSummary, Normalizer};
pub use similarity::{jaccard, token_set};
