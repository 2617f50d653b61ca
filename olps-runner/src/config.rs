//! Serializable run and batch configuration, parsed from TOML.
//!
//! A run file names one strategy plus the engine settings around it:
//!
//! ```toml
//! initial_capital = 10000
//!
//! [strategy]
//! id = "OLMAR"
//! [strategy.params]
//! epsilon = 10
//! window = 5
//!
//! [rebalance]
//! type = "weekly"
//!
//! [costs]
//! preset = "maxblue"
//! ```
//!
//! A batch file carries the same shared settings plus a `[[jobs]]` array;
//! each job overrides the strategy and optionally its assets, rebalancing
//! frequency, holding mode, capital and costs.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use olps_core::{
    CostModel, EngineConfig, HoldingMode, RebalanceFrequency, StrategyParams, StrategyRegistry,
};

/// Content-addressed identifier of a resolved run configuration.
pub type RunId = String;

/// Errors from reading or resolving configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Invalid(#[from] olps_core::ConfigError),
    #[error("batch configuration has no jobs")]
    NoJobs,
    #[error("failed to serialize run fingerprint: {0}")]
    Fingerprint(#[from] serde_json::Error),
}

fn default_capital() -> f64 {
    10_000.0
}

fn default_true() -> bool {
    true
}

// ─── Strategy ────────────────────────────────────────────────────────

/// Registry id plus hyperparameters; missing parameters take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub id: String,
    #[serde(default)]
    pub params: StrategyParams,
}

impl StrategyConfig {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            params: StrategyParams::new(),
        }
    }

    pub fn with_params(mut self, params: StrategyParams) -> Self {
        self.params = params;
        self
    }
}

// ─── Costs ───────────────────────────────────────────────────────────

/// Named commission schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostPreset {
    Maxblue,
    Zero,
    Percentage,
}

/// The `[costs]` table: an optional preset, then field-by-field overrides.
///
/// Without a preset the base schedule is free with an unbounded `max_fee`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<CostPreset>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_fee: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_fee: Option<f64>,
}

impl Default for CostsConfig {
    fn default() -> Self {
        Self {
            preset: None,
            enabled: true,
            rate: None,
            min_fee: None,
            max_fee: None,
            fixed_fee: None,
        }
    }
}

impl CostsConfig {
    pub fn preset(preset: CostPreset) -> Self {
        Self {
            preset: Some(preset),
            ..Self::default()
        }
    }

    /// The validated cost model this table describes.
    pub fn resolve(&self) -> Result<CostModel, olps_core::ConfigError> {
        let mut model = match self.preset {
            Some(CostPreset::Maxblue) => CostModel::maxblue(),
            Some(CostPreset::Zero) => CostModel::zero(),
            Some(CostPreset::Percentage) | None => CostModel::percentage(0.0),
        };
        if let Some(rate) = self.rate {
            model.rate = rate;
        }
        if let Some(min_fee) = self.min_fee {
            model.min_fee = min_fee;
        }
        if let Some(max_fee) = self.max_fee {
            model.max_fee = max_fee;
        }
        if let Some(fixed_fee) = self.fixed_fee {
            model.fixed_fee = fixed_fee;
        }
        model.enabled = self.enabled;
        model.validate()?;
        Ok(model)
    }
}

// ─── Single run ──────────────────────────────────────────────────────

/// Everything needed to reproduce one backtest on a given price file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    #[serde(default = "default_capital")]
    pub initial_capital: f64,
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub rebalance: RebalanceFrequency,
    #[serde(default)]
    pub holding: HoldingMode,
    #[serde(default)]
    pub costs: CostsConfig,
    /// Subset of price-file columns to trade, in this order. All when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<Vec<String>>,
}

/// The canonical form hashed into a [`RunId`].
#[derive(Serialize)]
struct Canonical<'a> {
    strategy: &'static str,
    params: StrategyParams,
    engine: &'a EngineConfig,
    assets: &'a Option<Vec<String>>,
}

impl BacktestConfig {
    pub fn new(strategy: StrategyConfig) -> Self {
        Self {
            initial_capital: default_capital(),
            strategy,
            rebalance: RebalanceFrequency::default(),
            holding: HoldingMode::default(),
            costs: CostsConfig::default(),
            assets: None,
        }
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::parse(&read(path)?)
    }

    /// Engine settings with the cost table resolved and everything validated.
    pub fn engine_config(&self) -> Result<EngineConfig, olps_core::ConfigError> {
        let engine = EngineConfig::new(self.initial_capital)
            .with_rebalance(self.rebalance)
            .with_holding(self.holding)
            .with_costs(self.costs.resolve()?);
        engine.validate()?;
        Ok(engine)
    }

    /// Deterministic hash of the resolved configuration.
    ///
    /// The strategy is built from `registry` for `n_assets` so the hash covers
    /// its canonical id and hyperparameters after defaults. Two configurations
    /// that resolve to the same engine settings, strategy and asset list share
    /// a run id, however their cost tables or default parameters were spelled.
    pub fn run_id(
        &self,
        registry: &StrategyRegistry,
        n_assets: usize,
    ) -> Result<RunId, ConfigError> {
        let engine = self.engine_config()?;
        let strategy = registry.build(&self.strategy.id, &self.strategy.params, n_assets)?;
        let canonical = Canonical {
            strategy: strategy.info().id,
            params: strategy.params(),
            engine: &engine,
            assets: &self.assets,
        };
        let json = serde_json::to_vec(&canonical)?;
        Ok(blake3::hash(&json).to_hex().to_string())
    }
}

// ─── Batch ───────────────────────────────────────────────────────────

/// One `[[jobs]]` entry. Unset fields inherit the batch defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub strategy: StrategyConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_capital: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rebalance: Option<RebalanceFrequency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holding: Option<HoldingMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub costs: Option<CostsConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<Vec<String>>,
}

/// Shared defaults plus a list of jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_capital")]
    pub initial_capital: f64,
    #[serde(default)]
    pub rebalance: RebalanceFrequency,
    #[serde(default)]
    pub holding: HoldingMode,
    #[serde(default)]
    pub costs: CostsConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<Vec<String>>,
    /// Worker threads; all available cores when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
    #[serde(default = "default_true")]
    pub parallel: bool,
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
}

impl BatchConfig {
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let batch: Self = toml::from_str(text)?;
        if batch.jobs.is_empty() {
            return Err(ConfigError::NoJobs);
        }
        Ok(batch)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::parse(&read(path)?)
    }

    /// Each job merged with the shared defaults, named `job_name` or
    /// `"{index}-{strategy}"`.
    pub fn resolve(&self) -> Vec<(String, BacktestConfig)> {
        self.jobs
            .iter()
            .enumerate()
            .map(|(i, job)| {
                let name = job
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("{i}-{}", job.strategy.id));
                let config = BacktestConfig {
                    initial_capital: job.initial_capital.unwrap_or(self.initial_capital),
                    strategy: job.strategy.clone(),
                    rebalance: job.rebalance.unwrap_or(self.rebalance),
                    holding: job.holding.unwrap_or(self.holding),
                    costs: job.costs.clone().unwrap_or_else(|| self.costs.clone()),
                    assets: job.assets.clone().or_else(|| self.assets.clone()),
                };
                (name, config)
            })
            .collect()
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use olps_core::ParamValue;

    const RUN: &str = r#"
        initial_capital = 50000

        [strategy]
        id = "OLMAR"
        [strategy.params]
        epsilon = 10
        reversion_method = "ewa"
        alpha = 0.3

        [rebalance]
        type = "every_n"
        n = 5

        [costs]
        preset = "maxblue"
    "#;

    #[test]
    fn parses_run_file() {
        let config = BacktestConfig::parse(RUN).unwrap();
        assert_eq!(config.initial_capital, 50_000.0);
        assert_eq!(config.strategy.id, "OLMAR");
        assert_eq!(
            config.strategy.params.get("epsilon"),
            Some(&ParamValue::Number(10.0))
        );
        assert_eq!(
            config.strategy.params.get("reversion_method"),
            Some(&ParamValue::Text("ewa".into()))
        );
        assert_eq!(config.rebalance, RebalanceFrequency::EveryN { n: 5 });
        assert_eq!(config.costs.resolve().unwrap(), CostModel::maxblue());
        assert!(config.assets.is_none());
    }

    #[test]
    fn minimal_run_file_takes_defaults() {
        let config = BacktestConfig::parse("[strategy]\nid = \"EW\"\n").unwrap();
        let engine = config.engine_config().unwrap();
        assert_eq!(engine.initial_capital, 10_000.0);
        assert_eq!(engine.rebalance, RebalanceFrequency::Daily);
        assert_eq!(engine.holding, HoldingMode::Drift);
        assert!(engine.costs.is_free());
        assert_eq!(engine.costs.max_fee, f64::INFINITY);
    }

    #[test]
    fn explicit_fields_override_preset() {
        let costs: CostsConfig = toml::from_str(
            r#"
            preset = "maxblue"
            fixed_fee = 0.0
            "#,
        )
        .unwrap();
        let model = costs.resolve().unwrap();
        assert_eq!(model.rate, 0.0025);
        assert_eq!(model.fixed_fee, 0.0);

        let pct: CostsConfig = toml::from_str("preset = \"percentage\"\nrate = 0.002").unwrap();
        assert_eq!(pct.resolve().unwrap(), CostModel::percentage(0.002));
    }

    #[test]
    fn invalid_costs_are_rejected() {
        let costs: CostsConfig = toml::from_str("min_fee = 5.0\nmax_fee = 1.0").unwrap();
        assert!(costs.resolve().is_err());
        let mut config = BacktestConfig::new(StrategyConfig::new("EW"));
        config.costs.rate = Some(-0.1);
        assert!(config.engine_config().is_err());
        assert!(matches!(
            config.run_id(&StrategyRegistry::standard(), 3),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn run_id_deterministic() {
        let config = BacktestConfig::parse(RUN).unwrap();
        let registry = StrategyRegistry::standard();
        let id1 = config.run_id(&registry, 3).unwrap();
        let id2 = config.run_id(&registry, 3).unwrap();
        assert_eq!(id1, id2);
        assert_eq!(id1.len(), 64);
    }

    #[test]
    fn run_id_changes_with_params() {
        let a = BacktestConfig::parse(RUN).unwrap();
        let mut b = a.clone();
        b.strategy.params.insert("epsilon", 20.0);
        let registry = StrategyRegistry::standard();
        assert_ne!(a.run_id(&registry, 3).unwrap(), b.run_id(&registry, 3).unwrap());
    }

    #[test]
    fn run_id_ignores_cost_spelling() {
        let mut a = BacktestConfig::new(StrategyConfig::new("eg"));
        a.costs = CostsConfig::preset(CostPreset::Maxblue);
        let mut b = BacktestConfig::new(StrategyConfig::new("EG"));
        b.costs.rate = Some(0.0025);
        b.costs.min_fee = Some(8.90);
        b.costs.max_fee = Some(58.90);
        b.costs.fixed_fee = Some(2.00);
        let registry = StrategyRegistry::standard();
        assert_eq!(a.run_id(&registry, 3).unwrap(), b.run_id(&registry, 3).unwrap());
    }

    #[test]
    fn run_id_covers_resolved_defaults() {
        let registry = StrategyRegistry::standard();
        let implicit = BacktestConfig::new(StrategyConfig::new("olmar"));
        let explicit = BacktestConfig::new(StrategyConfig::new("OLMAR").with_params(
            StrategyParams::new()
                .with("epsilon", 10.0)
                .with("reversion_method", "sma")
                .with("window", 5_usize),
        ));
        assert_eq!(
            implicit.run_id(&registry, 4).unwrap(),
            explicit.run_id(&registry, 4).unwrap()
        );
        assert!(matches!(
            BacktestConfig::new(StrategyConfig::new("NOPE")).run_id(&registry, 4),
            Err(ConfigError::Invalid(olps_core::ConfigError::UnknownStrategy(_)))
        ));
    }

    #[test]
    fn batch_jobs_inherit_defaults() {
        let batch = BatchConfig::parse(
            r#"
            initial_capital = 1000
            assets = ["A", "B"]
            threads = 2

            [costs]
            preset = "zero"

            [[jobs]]
            strategy = { id = "EW" }

            [[jobs]]
            name = "pamr-2"
            strategy = { id = "PAMR", params = { variant = 2 } }
            assets = ["B", "C"]
            rebalance = { type = "monthly" }
            "#,
        )
        .unwrap();
        assert_eq!(batch.threads, Some(2));
        assert!(batch.parallel);

        let jobs = batch.resolve();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].0, "0-EW");
        assert_eq!(jobs[0].1.initial_capital, 1_000.0);
        assert_eq!(jobs[0].1.assets, Some(vec!["A".into(), "B".into()]));
        assert_eq!(jobs[0].1.costs, CostsConfig::preset(CostPreset::Zero));
        assert_eq!(jobs[1].0, "pamr-2");
        assert_eq!(jobs[1].1.assets, Some(vec!["B".into(), "C".into()]));
        assert_eq!(jobs[1].1.rebalance, RebalanceFrequency::Monthly);
    }

    #[test]
    fn empty_batch_is_an_error() {
        assert!(matches!(
            BatchConfig::parse("initial_capital = 5"),
            Err(ConfigError::NoJobs)
        ));
        assert!(matches!(
            BatchConfig::parse("jobs = 3"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = BacktestConfig::load(Path::new("/nonexistent/run.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/run.toml"));
    }
}
