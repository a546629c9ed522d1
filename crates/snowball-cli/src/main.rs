//! Snowball CLI - Command-line interface
//!
//! Usage:
//!   snowball run --config <toml> [--seeds <file>]
//!   snowball index <dir> --gazetteer <file> [--workers N] [--out <dir>]
//!   snowball tuples <tuple-log>
//!   snowball evaluate <tuple-log> <gold-file> [--min-confidence x]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use snowball_core::{AppConfig, LoggingConfig};
use snowball_extractor::{
    evaluate_pairs, read_gold_pairs, read_tuples, threshold_sweep, Bootstrapper, RunLog, SeedSet,
    TupleRecord,
};
use snowball_store::{collect_inputs, open_store, Indexer};
use snowball_tagger::GazetteerTagger;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "snowball")]
#[command(about = "Semi-supervised relation extraction by bootstrapping")]
#[command(version)]
struct Cli {
    /// TOML configuration file; environment variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bootstrapping loop
    Run {
        /// Seed file (defaults to `output.seeds_file`)
        #[arg(long)]
        seeds: Option<PathBuf>,
    },
    /// Tag extracted dump files into JSONL sentence shards
    Index {
        /// Directory of extracted dump files
        dir: PathBuf,
        /// Gazetteer (`TAG<TAB>phrase` per line)
        #[arg(long)]
        gazetteer: Option<PathBuf>,
        /// Number of workers
        #[arg(long)]
        workers: Option<usize>,
        /// Output directory for the shards
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the pairs of a tuple log, one `subject<TAB>object` per line
    Tuples {
        log: PathBuf,
        #[arg(long, default_value_t = 0.0)]
        min_confidence: f64,
    },
    /// Score a tuple log against a gold pair list
    Evaluate {
        log: PathBuf,
        gold: PathBuf,
        #[arg(long, default_value_t = 0.0)]
        min_confidence: f64,
        /// Also report a precision/recall sweep over confidence thresholds
        #[arg(long)]
        sweep: bool,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    config.validate()?;
    Ok(config)
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.level;
        EnvFilter::new(format!(
            "snowball={level},snowball_extractor={level},snowball_store={level},snowball_tagger={level}"
        ))
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    if config.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Pairs of records at or above `min_confidence`, in log order, deduplicated
fn confident_pairs(records: &[TupleRecord], min_confidence: f64) -> Vec<(&str, &str)> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|r| r.tuple.confidence() >= min_confidence)
        .map(|r| r.tuple.tuple.as_pair())
        .filter(|pair| seen.insert(*pair))
        .collect()
}

async fn run(config: &AppConfig, seeds: Option<PathBuf>) -> anyhow::Result<()> {
    let seeds_path = seeds.unwrap_or_else(|| config.output.seeds_file.clone());
    let seeds = SeedSet::from_file(&seeds_path)
        .with_context(|| format!("Failed to load seeds from {}", seeds_path.display()))?;

    let store = open_store(&config.store)?;
    let bootstrapper =
        Bootstrapper::new(store, config.snowball.clone()).with_page_size(config.store.page_size);
    let mut log = RunLog::from_config(&config.output)?;

    let outcome = bootstrapper.run(&seeds, &mut log).await?;
    info!(
        "Finished ({:?}): {} patterns, {} tuples written to {}",
        outcome.termination,
        outcome.patterns.len(),
        outcome.tuples.len(),
        log.tuples_path().display()
    );
    Ok(())
}

async fn index(
    config: &AppConfig,
    dir: PathBuf,
    gazetteer: Option<PathBuf>,
    workers: Option<usize>,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let gazetteer = config
        .indexer
        .gazetteer_or(gazetteer)
        .context("No gazetteer given (use --gazetteer)")?;
    let tagger = GazetteerTagger::from_file(&gazetteer)?;

    let inputs = collect_inputs(&dir)?;
    if inputs.is_empty() {
        bail!("No input files under {}", dir.display());
    }

    let indexer = Indexer::new(
        Arc::new(tagger),
        workers.unwrap_or(config.indexer.workers),
        out.unwrap_or_else(|| config.indexer.output_dir.clone()),
    );
    let report = indexer.run(inputs).await?;

    println!(
        "Indexed {} files ({} failed): {} pages, {} sentences",
        report.files, report.failed_files, report.pages, report.sentences
    );
    for shard in &report.shards {
        println!("  {}", shard.display());
    }
    Ok(())
}

fn print_tuples(log: &Path, min_confidence: f64) -> anyhow::Result<()> {
    let records = read_tuples(log)?;
    for (subject, object) in confident_pairs(&records, min_confidence) {
        println!("{subject}\t{object}");
    }
    Ok(())
}

fn evaluate(log: &Path, gold: &Path, min_confidence: f64, sweep: bool) -> anyhow::Result<()> {
    let records = read_tuples(log)?;
    let gold = read_gold_pairs(gold)?;

    let metrics = evaluate_pairs(confident_pairs(&records, min_confidence), &gold);
    println!("{}", metrics.report());

    if sweep {
        let thresholds: Vec<f64> = (0..=10).map(|i| i as f64 / 10.0).collect();
        println!("threshold\tprecision\trecall\tf1\tpredicted");
        for point in threshold_sweep(&records, &gold, &thresholds) {
            println!(
                "{:.1}\t{:.3}\t{:.3}\t{:.3}\t{}",
                point.threshold,
                point.metrics.precision(),
                point.metrics.recall(),
                point.metrics.f1_score(),
                point.metrics.predicted_total()
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    init_logging(&config.logging);

    match cli.command {
        Commands::Run { seeds } => run(&config, seeds).await,
        Commands::Index {
            dir,
            gazetteer,
            workers,
            out,
        } => index(&config, dir, gazetteer, workers, out).await,
        Commands::Tuples {
            log,
            min_confidence,
        } => print_tuples(&log, min_confidence),
        Commands::Evaluate {
            log,
            gold,
            min_confidence,
            sweep,
        } => evaluate(&log, &gold, min_confidence, sweep),
    }
}
