//! Single-run entry points — wires configuration, price data, the strategy
//! registry and metrics together.
//!
//! - `run_single()`: pre-loaded prices, one configuration. Used by the batch
//!   runner and tests.
//! - `run_from_files()`: loads the TOML configuration and the CSV prices
//!   first. Used by the CLI.

use std::borrow::Cow;
use std::path::Path;
use std::sync::atomic::AtomicBool;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use olps_core::{run_registered, BacktestError, BacktestResult, PriceMatrix, StrategyRegistry};

use crate::config::{BacktestConfig, ConfigError, RunId};
use crate::data_loader::{load_prices_csv, LoadError};
use crate::metrics::PerformanceMetrics;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Load(#[from] LoadError),
    #[error(transparent)]
    Backtest(#[from] BacktestError),
    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl From<olps_core::ConfigError> for RunError {
    fn from(e: olps_core::ConfigError) -> Self {
        RunError::Backtest(e.into())
    }
}

impl From<olps_core::DataError> for RunError {
    fn from(e: olps_core::DataError) -> Self {
        RunError::Backtest(e.into())
    }
}

/// Current schema version for persisted reports.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// A finished run: its configuration, the engine result and derived metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub name: String,
    pub config: BacktestConfig,
    pub metrics: PerformanceMetrics,
    pub result: BacktestResult,
}

impl RunReport {
    pub fn cancelled(&self) -> bool {
        self.result.metadata.cancelled
    }
}

/// Run one configuration on pre-loaded prices — no I/O.
///
/// The matrix is restricted to `config.assets` when given. `cancel` is
/// checked once per date; a cancelled run still returns its partial report.
pub fn run_single(
    name: &str,
    config: &BacktestConfig,
    prices: &PriceMatrix,
    registry: &StrategyRegistry,
    cancel: Option<&AtomicBool>,
) -> Result<RunReport, RunError> {
    let engine = config.engine_config()?;
    let matrix = match &config.assets {
        Some(assets) => Cow::Owned(prices.select_assets(assets)?),
        None => Cow::Borrowed(prices),
    };
    // strategy build errors surface the same way the engine reports them
    let run_id = config
        .run_id(registry, matrix.n_assets())
        .map_err(|e| match e {
            ConfigError::Invalid(inner) => RunError::from(inner),
            other => RunError::Config(other),
        })?;

    let result = run_registered(
        &matrix,
        registry,
        &config.strategy.id,
        &config.strategy.params,
        &engine,
        cancel,
    )?;
    let metrics = PerformanceMetrics::compute(&result);

    Ok(RunReport {
        schema_version: SCHEMA_VERSION,
        run_id,
        name: name.to_string(),
        config: config.clone(),
        metrics,
        result,
    })
}

/// Load `config_path` and `prices_path`, then run with the standard registry.
pub fn run_from_files(
    config_path: &Path,
    prices_path: &Path,
    cancel: Option<&AtomicBool>,
) -> Result<RunReport, RunError> {
    let config = BacktestConfig::load(config_path)?;
    let prices = load_prices_csv(prices_path)?;
    let name = config.strategy.id.clone();
    run_single(&name, &config, &prices, &StrategyRegistry::standard(), cancel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CostPreset, CostsConfig, StrategyConfig};
    use chrono::NaiveDate;
    use olps_core::{DataError, StrategyParams};

    fn prices() -> PriceMatrix {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let dates = (0..12).map(|i| start + chrono::Duration::days(i)).collect();
        let rows = (0..12)
            .map(|t| {
                let t = t as f64;
                vec![100.0 + t, 50.0 + (t * 0.8).sin() * 3.0, 20.0 + t * 0.1]
            })
            .collect();
        PriceMatrix::new(dates, vec!["A".into(), "B".into(), "C".into()], rows).unwrap()
    }

    #[test]
    fn runs_a_configuration() {
        let mut config = BacktestConfig::new(StrategyConfig::new("olmar"));
        config.costs = CostsConfig::preset(CostPreset::Maxblue);
        let report = run_single("olmar", &config, &prices(), &StrategyRegistry::standard(), None)
            .unwrap();
        assert_eq!(report.result.len(), 12);
        assert_eq!(report.result.metadata.strategy.id, "OLMAR");
        assert_eq!(
            report.run_id,
            config.run_id(&StrategyRegistry::standard(), 3).unwrap()
        );
        assert!(report.metrics.total_fees > 0.0);
        assert!(!report.cancelled());
    }

    #[test]
    fn restricts_to_configured_assets() {
        let mut config = BacktestConfig::new(StrategyConfig::new("EW"));
        config.assets = Some(vec!["C".into(), "A".into()]);
        let report =
            run_single("ew", &config, &prices(), &StrategyRegistry::standard(), None).unwrap();
        assert_eq!(report.result.assets, vec!["C".to_string(), "A".to_string()]);
        assert_eq!(report.result.weights[0], vec![0.5, 0.5]);
    }

    #[test]
    fn unknown_asset_and_strategy_are_errors() {
        let registry = StrategyRegistry::standard();
        let mut config = BacktestConfig::new(StrategyConfig::new("EW"));
        config.assets = Some(vec!["ZZZ".into()]);
        assert!(matches!(
            run_single("x", &config, &prices(), &registry, None),
            Err(RunError::Backtest(BacktestError::Data(DataError::UnknownAsset(_))))
        ));

        let config = BacktestConfig::new(StrategyConfig::new("NOPE"));
        assert!(matches!(
            run_single("x", &config, &prices(), &registry, None),
            Err(RunError::Backtest(BacktestError::Config(
                olps_core::ConfigError::UnknownStrategy(_)
            )))
        ));
    }

    #[test]
    fn bad_hyperparameters_fail_before_running() {
        let params = StrategyParams::new().with("window", 2.5);
        let config = BacktestConfig::new(StrategyConfig::new("OLMAR").with_params(params));
        assert!(matches!(
            run_single("x", &config, &prices(), &StrategyRegistry::standard(), None),
            Err(RunError::Backtest(BacktestError::Config(
                olps_core::ConfigError::NotAnInteger { .. }
            )))
        ));
    }
}
