use std::path::PathBuf;

use crate::app_config::{Environment, RuntimeConfig};
use crate::ConfigError;

/// Load runtime configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_runtime_config() -> Result<RuntimeConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_runtime_config_from_env()
}

/// Load runtime configuration from environment variables already in the
/// process, without touching `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_runtime_config_from_env() -> Result<RuntimeConfig, ConfigError> {
    build_runtime_config(|key| std::env::var(key))
}

fn build_runtime_config<F>(lookup: F) -> Result<RuntimeConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let env = parse_environment(&or_default("PULSE_ENV", "development"))?;
    let log_level = or_default("PULSE_LOG_LEVEL", "info");
    let config_path = lookup("PULSE_CONFIG_PATH")
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from);
    let output_dir = PathBuf::from(or_default("PULSE_OUTPUT_DIR", "./data/analysis"));
    let max_concurrent_shards = parse_usize("PULSE_MAX_CONCURRENT_SHARDS", "4")?;
    if max_concurrent_shards == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "PULSE_MAX_CONCURRENT_SHARDS".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    Ok(RuntimeConfig {
        env,
        log_level,
        config_path,
        output_dir,
        max_concurrent_shards,
    })
}

fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s.trim().to_lowercase().as_str() {
        "development" | "dev" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" | "prod" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "PULSE_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}
