//! OLPS Runner — configuration files, batch runs, metrics, price loading, export.
//!
//! This crate builds on `olps-core` to provide:
//! - TOML run and batch configuration with content-addressed run ids
//! - Wide-format CSV price loading
//! - Single-run entry points producing a `RunReport`
//! - Parallel batch execution on a rayon pool with shared cancellation
//! - Performance metrics over the net value series
//! - JSON and CSV artifacts plus plain-text summaries

pub mod batch;
pub mod config;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod runner;

pub use batch::{run_batch, BatchJob, BatchOptions, BatchProgress, JobOutcome};
pub use config::{
    BacktestConfig, BatchConfig, ConfigError, CostPreset, CostsConfig, JobConfig, RunId,
    StrategyConfig,
};
pub use data_loader::{load_prices_csv, read_prices_csv, LoadError};
pub use metrics::PerformanceMetrics;
pub use runner::{run_from_files, run_single, RunError, RunReport, SCHEMA_VERSION};
