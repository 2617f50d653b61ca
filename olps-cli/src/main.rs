//! OLPS CLI — run single backtests, batches, and list strategies.
//!
//! Commands:
//! - `run` — execute one backtest from a TOML config and a CSV price file
//! - `batch` — execute a `[[jobs]]` batch file in parallel
//! - `strategies` — list the registry with family, kind and executability

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use olps_core::StrategyRegistry;
use olps_runner::export::{generate_batch_table, generate_summary, save_artifacts};
use olps_runner::{
    load_prices_csv, run_batch, run_single, BacktestConfig, BatchConfig, BatchProgress, RunReport,
};

#[derive(Parser)]
#[command(name = "olps", about = "OLPS CLI — online portfolio selection backtester")]
struct Cli {
    /// Log level when RUST_LOG is unset (error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute one backtest from a TOML config file.
    Run {
        /// Path to the run TOML config.
        #[arg(long)]
        config: PathBuf,

        /// Wide-format price CSV (date,ASSET1,ASSET2,...).
        #[arg(long)]
        prices: PathBuf,

        /// Write report.json, equity.csv and weights.csv under this directory.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Execute every job of a batch TOML file.
    Batch {
        /// Path to the batch TOML config.
        #[arg(long)]
        config: PathBuf,

        /// Wide-format price CSV shared by all jobs.
        #[arg(long)]
        prices: PathBuf,

        /// Worker threads (overrides the config file).
        #[arg(long)]
        threads: Option<usize>,

        /// Run jobs one after another on a single thread.
        #[arg(long, default_value_t = false)]
        sequential: bool,

        /// Write one artifact directory per successful job under this directory.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List available strategies.
    Strategies,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level);

    match cli.command {
        Commands::Run {
            config,
            prices,
            output,
        } => run_cmd(&config, &prices, output.as_deref()),
        Commands::Batch {
            config,
            prices,
            threads,
            sequential,
            output,
        } => batch_cmd(&config, &prices, threads, sequential, output.as_deref()),
        Commands::Strategies => {
            print_strategies(&StrategyRegistry::standard());
            Ok(())
        }
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `--log-level`.
fn setup_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .try_init()
        .ok();
}

fn run_cmd(config_path: &Path, prices_path: &Path, output: Option<&Path>) -> Result<()> {
    let config = BacktestConfig::load(config_path)?;
    let prices = load_prices_csv(prices_path)?;
    let registry = StrategyRegistry::standard();

    let report = run_single(&config.strategy.id, &config, &prices, &registry, None)?;
    print!("{}", generate_summary(&report));
    print_warnings(&report);

    if let Some(dir) = output {
        let run_dir = save_artifacts(&report, dir)?;
        println!("\nArtifacts saved to: {}", run_dir.display());
    }
    Ok(())
}

fn batch_cmd(
    config_path: &Path,
    prices_path: &Path,
    threads: Option<usize>,
    sequential: bool,
    output: Option<&Path>,
) -> Result<()> {
    let batch = BatchConfig::load(config_path)?;
    let prices = load_prices_csv(prices_path)?;
    let registry = StrategyRegistry::standard();

    let mut options = batch.options();
    if threads.is_some() {
        options.threads = threads;
    }
    if sequential {
        options.parallel = false;
    }
    if options.threads == Some(0) {
        bail!("--threads must be at least 1");
    }

    let jobs = batch.jobs();
    tracing::info!(jobs = jobs.len(), ?options, "starting batch");
    let progress = |p: &BatchProgress| {
        let status = if p.succeeded { "ok" } else { "FAILED" };
        eprintln!("[{}/{}] {} {status}", p.completed, p.total, p.name);
    };
    let outcomes = run_batch(&jobs, &prices, &registry, &options, None, Some(&progress))?;

    let mut reports: Vec<&RunReport> = Vec::new();
    let mut failures = 0;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(report) => reports.push(report),
            Err(e) => {
                failures += 1;
                eprintln!("Job '{}' failed: {e}", outcome.name);
            }
        }
    }

    println!();
    print!("{}", generate_batch_table(&reports));

    if let Some(dir) = output {
        for report in &reports {
            save_artifacts(report, dir)
                .with_context(|| format!("saving artifacts for job '{}'", report.name))?;
        }
        println!("\nArtifacts saved under: {}", dir.display());
    }

    if failures > 0 {
        bail!("{failures} of {} jobs failed", outcomes.len());
    }
    Ok(())
}

fn print_warnings(report: &RunReport) {
    let warnings = &report.result.metadata.warnings;
    if warnings.is_empty() {
        return;
    }
    println!("\n  {} convergence warnings (first 5):", warnings.len());
    for w in warnings.iter().take(5) {
        let date = w.date.map_or_else(|| format!("#{}", w.date_index), |d| d.to_string());
        println!("    {date} [{:?}] {}", w.kind, w.detail);
    }
}

fn print_strategies(registry: &StrategyRegistry) {
    println!(
        "{:<10} {:<38} {:<18} {:<20} {:<10} executable",
        "id", "name", "family", "kind", "complexity"
    );
    for info in registry.infos() {
        println!(
            "{:<10} {:<38} {:<18} {:<20} {:<10} {}",
            info.id,
            info.name,
            format!("{:?}", info.family),
            format!("{:?}", info.kind),
            format!("{:?}", info.complexity),
            if info.executable() { "yes" } else { "no" },
        );
    }
}
