//! greenrank-agent - Carbon Efficiency Ranking CLI
//!
//! Reads batches of raw vendor records, runs them through the
//! normalization-and-ranking pipeline, and writes normalized events,
//! monthly rollups, and the green score ranking as JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use greenrank_agent::demo;
use greenrank_agent::RankerAgent;
use greenrank_common::config::{load_config, LoggingConfig, PipelineConfig};
use greenrank_common::records::RawRecord;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(
    name = "greenrank-agent",
    version,
    about = "Normalize vendor operational records and rank carbon efficiency"
)]
struct Cli {
    /// Path to TOML config; falls back to GREENRANK_CONFIG, then the OS
    /// config directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process a batch of raw records from a JSON file
    Run {
        /// Input JSON file: array of raw records
        #[arg(long)]
        input: PathBuf,
        /// Output directory for events/rollups/rankings JSON; rankings go
        /// to stdout when omitted
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Generate and process a built-in messy sample batch
    Demo {
        /// Records per vendor style
        #[arg(long, default_value_t = 10)]
        per_vendor: usize,
        /// RNG seed for reproducible batches
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref()).context("configuration rejected")?;
    init_tracing(&config.logging)?;

    info!("Starting greenrank-agent");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Run { input, output } => {
            run_batch(config.pipeline, &input, output.as_deref()).await
        }
        Command::Demo { per_vendor, seed } => run_demo(config.pipeline, per_vendor, seed).await,
    }
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let level = match logging.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    match &logging.file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("open log file {}", path.display()))?;
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_ansi(false)
                .with_writer(std::sync::Arc::new(file))
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        None => {
            let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}

async fn run_batch(config: PipelineConfig, input: &Path, output: Option<&Path>) -> Result<()> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("read input {}", input.display()))?;
    let records: Vec<RawRecord> =
        serde_json::from_str(&text).with_context(|| format!("parse input {}", input.display()))?;

    let agent = RankerAgent::new(config);
    let outcome = agent.process_batch(records).await;

    info!(
        "{} records processed ({} degraded), {} rollups, {} companies ranked",
        outcome.outcomes.len(),
        outcome.degraded_count(),
        outcome.rollups.len(),
        outcome.rankings.len()
    );

    match output {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create output directory {}", dir.display()))?;
            write_json(&dir.join("events.json"), &outcome.outcomes)?;
            write_json(&dir.join("rollups.json"), &outcome.rollups)?;
            write_json(&dir.join("rankings.json"), &outcome.rankings)?;
            info!("Results written to {}", dir.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&outcome.rankings)?),
    }
    Ok(())
}

async fn run_demo(config: PipelineConfig, per_vendor: usize, seed: u64) -> Result<()> {
    let records = demo::sample_batch(seed, per_vendor);
    info!("Generated {} messy sample records", records.len());

    let agent = RankerAgent::new(config);
    let outcome = agent.process_batch(records).await;

    println!("rank  company               green  tCO2e    g/1k tok  quality");
    for entry in &outcome.rankings {
        println!(
            "{:<5} {:<21} {:>5.1} {:>8.3} {:>9} {:>8.1}",
            entry.rank,
            entry.company,
            entry.green_score,
            entry.tco2e,
            entry
                .intensity_g_per_1k_tokens
                .map(|g| format!("{:.2}", g))
                .unwrap_or_else(|| "-".to_string()),
            entry.quality_score,
        );
    }
    println!(
        "\n{} of {} records degraded",
        outcome.degraded_count(),
        outcome.outcomes.len()
    );
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    std::fs::write(path, text).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
