// src/bin/cli.rs

//! harvester: Adaptive Catalog Harvester CLI
//!
//! Entry point for local runs: harvest a catalog snapshot, inspect staged
//! changes, and validate configuration.

use clap::{Parser, Subcommand};

use harvester::error::{AppError, Result};
use harvester::models::HarvestConfig;
use harvester::pipeline::{compute_diff, run_harvest};
use harvester::storage::{HarvestSnapshot, HarvestStorage, LocalStorage};
use harvester::utils::http::HttpTransport;

#[derive(Parser, Debug)]
#[command(
    name = "harvester",
    version = "1.0.0",
    about = "Adaptive catalog harvester"
)]

/// CLI Arguments
struct Cli {
    #[arg(short, long, default_value = "data/config.toml")]
    config: String,

    /// Storage root directory
    #[arg(short, long, default_value = "data/storage")]
    output: String,

    #[command(subcommand)]
    command: Command,
}

/// CLI Commands
#[derive(Subcommand, Debug)]
enum Command {
    /// Run a full harvest and stage its changes
    Harvest {
        /// Seed the run from the last checkpoint
        #[arg(long)]
        resume: bool,
        /// Hard row cap for this run (overrides config)
        #[arg(long)]
        max_rows: Option<usize>,
    },
    /// Diff two snapshot files without touching storage
    Diff {
        /// Baseline snapshot (runs/<id>.json or current.json)
        baseline: String,
        /// Snapshot to compare against the baseline
        snapshot: String,
    },
    /// Validate configuration
    Validate,
    /// Show storage state (baseline size, checkpoint presence)
    Info,
}

/// Main entry point
#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = HarvestConfig::load_or_default(&cli.config);
    let storage = LocalStorage::new(&cli.output);

    match cli.command {
        Command::Harvest { resume, max_rows } => {
            if let Some(cap) = max_rows {
                config.engine.max_rows = cap;
            }
            config.validate()?;
            let transport = HttpTransport::new(&config.http)?;
            let report = run_harvest(&config, &transport, &storage, resume).await?;
            println!(
                "run {}: {} rows via [{}], stopped: {:?}, changes: {}",
                report.run_id,
                report.meta.rows,
                report.meta.strategy,
                report.meta.stop,
                report.changes.summary()
            );
        }
        Command::Diff { baseline, snapshot } => {
            let before = read_snapshot(&baseline)?;
            let after = read_snapshot(&snapshot)?;
            let base_map = before
                .rows
                .into_iter()
                .filter(|r| !r.identity().is_empty())
                .map(|r| (r.identity(), r))
                .collect();
            let changes = compute_diff(&after.rows, &base_map);
            println!("{}", changes.summary());
            for change in &changes.added {
                println!("+ {}", change.identity);
            }
            for change in &changes.removed {
                println!("- {}", change.identity);
            }
            for change in &changes.modified {
                println!("~ {}", change.identity);
            }
        }
        Command::Validate => {
            config.validate()?;
            println!("configuration ok ({})", config.site.base_url);
        }
        Command::Info => {
            let baseline = storage.load_baseline().await?;
            let checkpoint = storage.load_checkpoint().await?;
            println!("baseline: {} records", baseline.len());
            match checkpoint {
                Some(rows) => println!("checkpoint: {} rows pending", rows.len()),
                None => println!("checkpoint: none"),
            }
        }
    }

    Ok(())
}

fn read_snapshot(path: &str) -> Result<HarvestSnapshot> {
    let bytes = std::fs::read(path)
        .map_err(|e| AppError::storage(format!("cannot read snapshot {path}: {e}")))?;
    Ok(serde_json::from_slice(&bytes)?)
}
