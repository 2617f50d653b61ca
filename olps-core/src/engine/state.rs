//! Engine configuration, mutable accounting state, and result types.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::costs::CostModel;
use crate::diagnostics::ConvergenceWarning;
use crate::error::ConfigError;
use crate::numeric::safe::{dot, DENOM_EPS};
use crate::rebalance::RebalanceFrequency;
use crate::strategies::{StrategyDescriptor, StrategyParams};

/// What held weights do between rebalancing dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldingMode {
    /// Weights drift with price relatives (buy-and-hold between rebalances).
    #[default]
    Drift,
    /// The last target is restored on every date, paying the implied trades.
    /// Strategies that hold drifted weights by definition (BAH) keep drifting.
    Reproject,
}

/// Configuration for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub initial_capital: f64,
    #[serde(default)]
    pub rebalance: RebalanceFrequency,
    #[serde(default)]
    pub costs: CostModel,
    #[serde(default)]
    pub holding: HoldingMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(10_000.0)
    }
}

impl EngineConfig {
    /// Daily rebalancing, no costs, drifting holdings.
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            rebalance: RebalanceFrequency::Daily,
            costs: CostModel::zero(),
            holding: HoldingMode::Drift,
        }
    }

    pub fn with_rebalance(mut self, rebalance: RebalanceFrequency) -> Self {
        self.rebalance = rebalance;
        self
    }

    pub fn with_costs(mut self, costs: CostModel) -> Self {
        self.costs = costs;
        self
    }

    pub fn with_holding(mut self, holding: HoldingMode) -> Self {
        self.holding = holding;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
            return Err(ConfigError::InvalidCapital(self.initial_capital));
        }
        self.rebalance.validate()?;
        self.costs.validate()
    }
}

/// Portfolio state that evolves date by date.
///
/// `held` are the weights carried by the portfolio right now; all zeros means
/// the capital is still in cash.
#[derive(Debug, Clone)]
pub struct EngineState {
    held: Vec<f64>,
    last_target: Vec<f64>,
    gross: f64,
    net: f64,
}

impl EngineState {
    pub fn new(n_assets: usize, initial_capital: f64) -> Self {
        Self {
            held: vec![0.0; n_assets],
            last_target: vec![0.0; n_assets],
            gross: initial_capital,
            net: initial_capital,
        }
    }

    pub fn held(&self) -> &[f64] {
        &self.held
    }

    pub fn last_target(&self) -> &[f64] {
        &self.last_target
    }

    pub fn gross(&self) -> f64 {
        self.gross
    }

    pub fn net(&self) -> f64 {
        self.net
    }

    /// Apply one period's price relatives to both value series and let the
    /// held weights drift.
    pub fn drift(&mut self, relative: &[f64]) {
        let growth = dot(&self.held, relative);
        if growth.is_nan() || growth <= DENOM_EPS {
            // in cash, or a wiped-out book: nothing moves
            return;
        }
        self.gross *= growth;
        self.net *= growth;
        for (w, x) in self.held.iter_mut().zip(relative) {
            *w = *w * x / growth;
        }
    }

    /// Trade from the held weights to `target` at the current net value.
    ///
    /// Returns `(turnover, fee)`. The fee is capped at the portfolio value.
    pub fn rebalance(&mut self, target: &[f64], costs: &CostModel) -> (f64, f64) {
        let pre = self.net;
        let trades: Vec<f64> = target
            .iter()
            .zip(&self.held)
            .map(|(t, h)| pre * (t - h))
            .collect();
        let turnover: f64 = target
            .iter()
            .zip(&self.held)
            .map(|(t, h)| (t - h).abs())
            .sum();
        let fee = costs.total_fee(&trades).min(pre.max(0.0));
        self.net = pre - fee;
        self.held.copy_from_slice(target);
        self.last_target.copy_from_slice(target);
        (turnover, fee)
    }
}

/// Everything a caller needs besides the series themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestMetadata {
    pub strategy: StrategyDescriptor,
    /// Hyperparameters after defaults were applied.
    pub hyperparameters: StrategyParams,
    pub warnings: Vec<ConvergenceWarning>,
    /// Indices of the dates on which the strategy was invoked.
    pub rebalance_dates: Vec<usize>,
    pub rebalance: RebalanceFrequency,
    pub holding: HoldingMode,
    pub initial_capital: f64,
    pub cancelled: bool,
    pub completed_dates: usize,
    pub total_dates: usize,
    pub total_fees: f64,
    pub total_turnover: f64,
}

/// Output of one backtest. Every series has one entry per completed date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub dates: Vec<NaiveDate>,
    pub assets: Vec<String>,
    /// Weights held at the close of each date.
    pub weights: Vec<Vec<f64>>,
    /// Portfolio value before transaction costs.
    pub gross_values: Vec<f64>,
    /// Portfolio value after transaction costs.
    pub net_values: Vec<f64>,
    pub turnover: Vec<f64>,
    pub fees: Vec<f64>,
    pub metadata: BacktestMetadata,
}

impl BacktestResult {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn final_gross_value(&self) -> Option<f64> {
        self.gross_values.last().copied()
    }

    pub fn final_net_value(&self) -> Option<f64> {
        self.net_values.last().copied()
    }
}
