use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Process-level settings read from the environment.
///
/// Pipeline behaviour lives in [`crate::PipelineConfig`]; this only covers
/// where things are and how loudly to log.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub env: Environment,
    pub log_level: String,
    /// YAML pipeline config. `None` runs with built-in defaults.
    pub config_path: Option<PathBuf>,
    pub output_dir: PathBuf,
    /// Upper bound on shards processed concurrently.
    pub max_concurrent_shards: usize,
}
