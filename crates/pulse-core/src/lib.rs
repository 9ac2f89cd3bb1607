//! Shared data model and configuration for the pulse signal pipeline.
//!
//! Every stage consumes the previous stage's value and produces a new one;
//! nothing here is mutated after construction.

pub mod app_config;
pub mod config;
pub mod error;
pub mod pipeline_config;
pub mod records;
pub mod signals;

pub use app_config::{Environment, RuntimeConfig};
pub use config::{load_runtime_config, load_runtime_config_from_env};
pub use error::ConfigError;
pub use pipeline_config::{
    load_pipeline_config, parse_pipeline_config, AggregationConfig, CleaningConfig, DedupConfig,
    EmojiMode, EngagementWeights, FeatureConfig, MarkerMode, PipelineConfig,
    RecommendationThresholds, SignalConfig, SignalWeights,
};
pub use records::{parse_engagement_count, CleanRecord, Engagement, RawRecord, RejectionReason};
pub use signals::{
    AggregatedSignal, ConfidenceInterval, Direction, DirectionCounts, FeatureVector,
    Recommendation, SentimentLabel, Signal, SignalComponents,
};
