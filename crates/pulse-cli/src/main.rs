mod run;
mod sink;
mod source;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use pulse_analyzer::GroupBy;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "pulse")]
#[command(about = "Score social posts into grouped trading signals")]
struct Cli {
    /// Pipeline YAML config. Overrides `PULSE_CONFIG_PATH`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Normalize, deduplicate, score and aggregate a batch of raw posts.
    Run {
        /// JSON array or JSON Lines file of raw posts.
        #[arg(long)]
        input: PathBuf,
        /// Output directory. Defaults to `PULSE_OUTPUT_DIR`.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Aggregation key: tag, hour or day.
        #[arg(long, default_value = "tag")]
        group_by: GroupBy,
        /// Split the input into windows of this many hours and process them
        /// concurrently.
        #[arg(long)]
        shard_hours: Option<u32>,
        /// Minimum records for a group to be reported.
        #[arg(long)]
        min_count: Option<usize>,
        /// Print what would be processed without writing anything.
        #[arg(long)]
        dry_run: bool,
    },
    /// Load and validate configuration, then print the effective settings.
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let runtime = pulse_core::load_runtime_config_from_env()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(runtime.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    let config_path = cli.config.or_else(|| runtime.config_path.clone());
    let mut config = pulse_core::load_pipeline_config(config_path.as_deref())
        .context("loading pipeline config")?;

    match cli.command {
        Some(Commands::Run {
            input,
            output,
            group_by,
            shard_hours,
            min_count,
            dry_run,
        }) => {
            if let Some(min_count) = min_count {
                config.aggregation.min_count = min_count;
            }
            let args = run::RunArgs {
                input,
                output_dir: output.unwrap_or_else(|| runtime.output_dir.clone()),
                group_by,
                shard_hours,
                dry_run,
            };
            run::run_batch(&runtime, &config, &args).await?;
        }
        Some(Commands::CheckConfig) => {
            config.validate()?;
            println!("# runtime: {runtime:?}");
            print!(
                "{}",
                serde_yaml::to_string(&config).context("rendering pipeline config")?
            );
        }
        None => println!("pulse: no command given; try `pulse run --input posts.jsonl`"),
    }

    Ok(())
}
