//! Online portfolio selection strategies.
//!
//! Each strategy is a small state machine behind the [`Strategy`] trait:
//! construction validates hyperparameters and builds the initial state, then
//! the orchestrator calls `observe` on every date and `step` on rebalancing
//! dates. State is owned by one instance for one backtest and never shared.
//!
//! Families:
//! - baseline: EW, BAH, CRP
//! - momentum: EG, UP, WAEG
//! - mean reversion: OLMAR, PAMR, CWMR, RMR, DTC
//! - correlation: CORN, CORN-K, CORN-U
//! - follow the leader: BCRP, BestStock, FTL, FTRL

pub mod baseline;
pub mod corn;
pub mod cwmr;
pub mod dtc;
pub mod follow_leader;
pub mod momentum;
pub mod olmar;
pub mod pamr;
pub mod params;
pub mod registry;
pub mod rmr;
pub mod waeg;

use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostics;
use crate::domain::History;

pub use params::{ParamReader, ParamValue, StrategyParams};
pub use registry::StrategyRegistry;

/// Algorithm family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyFamily {
    Baseline,
    Momentum,
    MeanReversion,
    Correlation,
    FollowTheLeader,
}

/// Information use and live-trading suitability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Simple causal reference portfolio.
    Benchmark,
    /// Uses the full horizon, including future prices. Not executable.
    BenchmarkLookahead,
    /// Uses only data up to the decision date.
    Causal,
    /// Causal, driven by lagging estimates such as moving averages.
    CausalLagging,
}

/// Rough computational cost per date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Low,
    Medium,
    High,
    VeryHigh,
}

/// Static description of a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub family: StrategyFamily,
    pub kind: StrategyKind,
    pub complexity: Complexity,
    pub reference: Option<&'static str>,
}

impl StrategyInfo {
    /// Whether the strategy could be traded live (no lookahead).
    pub fn executable(&self) -> bool {
        self.kind != StrategyKind::BenchmarkLookahead
    }

    pub fn describe(&self) -> StrategyDescriptor {
        StrategyDescriptor {
            id: self.id.to_string(),
            name: self.name.to_string(),
            family: self.family,
            kind: self.kind,
            complexity: self.complexity,
            executable: self.executable(),
        }
    }
}

/// Owned, serializable copy of [`StrategyInfo`] for result metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyDescriptor {
    pub id: String,
    pub name: String,
    pub family: StrategyFamily,
    pub kind: StrategyKind,
    pub complexity: Complexity,
    pub executable: bool,
}

/// A sequential weight-update algorithm.
///
/// Implementations must return weights on the simplex from `step`; they do
/// so by passing their raw output through `numeric::simplex::finalize`.
pub trait Strategy: Send {
    fn info(&self) -> &'static StrategyInfo;

    /// Hyperparameters after defaults were applied.
    fn params(&self) -> StrategyParams;

    /// Fit on the full horizon. Only called for `BenchmarkLookahead` strategies,
    /// once, before the date loop.
    fn fit_hindsight(&mut self, _full: &History<'_>, _diag: &mut Diagnostics) {}

    /// True for strategies whose holdings are meant to drift with prices;
    /// `HoldingMode::Reproject` does not restore their last target.
    fn holds_drift(&self) -> bool {
        false
    }

    /// Called on every date (before `step` on rebalancing dates) so tracking
    /// state sees every price relative.
    fn observe(&mut self, _history: &History<'_>) {}

    /// Target weights at the decision date `history.t()`.
    ///
    /// `held` are the weights carried into the date after drift; all zeros at
    /// date 0 when the portfolio is still in cash.
    fn step(&mut self, history: &History<'_>, held: &[f64], diag: &mut Diagnostics) -> Vec<f64>;
}
