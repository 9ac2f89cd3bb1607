use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// The sentiment scorer could not produce a score.
    #[error("sentiment scorer error: {0}")]
    Scorer(String),

    #[error("record {record} cannot be analyzed: {reason}")]
    InvalidRecord { record: String, reason: String },
}
