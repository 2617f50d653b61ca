//! Follow-the-leader family.
//!
//! BCRP and BestStock are hindsight benchmarks: they see the whole horizon
//! once, through `fit_hindsight`, and are not executable. FTL and FTRL
//! re-solve the log-optimal constant portfolio from scratch on every
//! decision date using only relatives observed so far.

use crate::diagnostics::{Diagnostics, WarningKind};
use crate::domain::History;
use crate::error::ConfigError;
use crate::numeric::optimize::maximize_log_wealth;
use crate::numeric::safe::safe_div;
use crate::numeric::simplex::{finalize, one_hot, uniform, Projection};
use crate::numeric::SolverSettings;

use super::{
    Complexity, ParamReader, Strategy, StrategyFamily, StrategyInfo, StrategyKind, StrategyParams,
};

pub const BCRP_INFO: StrategyInfo = StrategyInfo {
    id: "BCRP",
    name: "Best Constant Rebalanced Portfolio",
    family: StrategyFamily::FollowTheLeader,
    kind: StrategyKind::BenchmarkLookahead,
    complexity: Complexity::Medium,
    reference: Some("Cover 1991"),
};

pub const BEST_STOCK_INFO: StrategyInfo = StrategyInfo {
    id: "BestStock",
    name: "Best Stock",
    family: StrategyFamily::FollowTheLeader,
    kind: StrategyKind::BenchmarkLookahead,
    complexity: Complexity::Low,
    reference: None,
};

pub const FTL_INFO: StrategyInfo = StrategyInfo {
    id: "FTL",
    name: "Follow the Leader",
    family: StrategyFamily::FollowTheLeader,
    kind: StrategyKind::Causal,
    complexity: Complexity::High,
    reference: Some("Cover 1991"),
};

pub const FTRL_INFO: StrategyInfo = StrategyInfo {
    id: "FTRL",
    name: "Follow the Regularized Leader",
    family: StrategyFamily::FollowTheLeader,
    kind: StrategyKind::Causal,
    complexity: Complexity::High,
    reference: Some("Shalev-Shwartz 2012"),
};

/// Log-optimal weights over `relatives[1..]`, or `None` if the solver did
/// not converge.
fn solve_constant(
    relatives: &[Vec<f64>],
    n_assets: usize,
    penalty: f64,
    settings: &SolverSettings,
    diag: &mut Diagnostics,
) -> Option<Vec<f64>> {
    let samples: Vec<&[f64]> = relatives.iter().skip(1).map(Vec::as_slice).collect();
    let outcome = maximize_log_wealth(&samples, n_assets, penalty, settings);
    if !outcome.converged {
        diag.warn(
            WarningKind::SolverNotConverged,
            format!(
                "solver stopped after {} iterations over {} dates",
                outcome.iterations,
                samples.len()
            ),
        );
        return None;
    }
    Some(finalize(outcome.weights, Projection::Euclidean))
}

// ─── BCRP ────────────────────────────────────────────────────────────

/// Best constant rebalanced portfolio in hindsight.
#[derive(Debug, Clone)]
pub struct Bcrp {
    settings: SolverSettings,
    target: Option<Vec<f64>>,
}

impl Bcrp {
    pub fn new(settings: SolverSettings) -> Self {
        Self {
            settings,
            target: None,
        }
    }

    pub fn from_params(params: &StrategyParams, _n_assets: usize) -> Result<Self, ConfigError> {
        let reader = ParamReader::new(BCRP_INFO.id, params);
        reader.allow_only(&["max_iterations", "tolerance"])?;
        Ok(Self::new(reader.solver()?))
    }

    /// Weights fitted on the full horizon, once `fit_hindsight` ran.
    pub fn target(&self) -> Option<&[f64]> {
        self.target.as_deref()
    }
}

impl Strategy for Bcrp {
    fn info(&self) -> &'static StrategyInfo {
        &BCRP_INFO
    }

    fn params(&self) -> StrategyParams {
        StrategyParams::new().with_solver(&self.settings)
    }

    fn fit_hindsight(&mut self, full: &History<'_>, diag: &mut Diagnostics) {
        let n = full.n_assets();
        self.target = Some(
            solve_constant(full.relatives(), n, 0.0, &self.settings, diag)
                .unwrap_or_else(|| uniform(n)),
        );
    }

    fn step(&mut self, history: &History<'_>, _held: &[f64], _diag: &mut Diagnostics) -> Vec<f64> {
        self.target
            .clone()
            .unwrap_or_else(|| uniform(history.n_assets()))
    }
}

// ─── Best Stock ──────────────────────────────────────────────────────

/// All capital in the asset with the highest full-horizon return.
#[derive(Debug, Clone, Default)]
pub struct BestStock {
    best: Option<usize>,
}

impl BestStock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_params(params: &StrategyParams, _n_assets: usize) -> Result<Self, ConfigError> {
        ParamReader::new(BEST_STOCK_INFO.id, params).allow_only(&[])?;
        Ok(Self::new())
    }

    /// Index of the chosen asset, once `fit_hindsight` ran.
    pub fn best(&self) -> Option<usize> {
        self.best
    }
}

/// Index of the largest `last / first` price ratio; the lower index wins ties.
pub fn best_asset(prices: &[Vec<f64>]) -> Option<usize> {
    let (first, last) = (prices.first()?, prices.last()?);
    let mut best: Option<(usize, f64)> = None;
    for (i, (p0, p1)) in first.iter().zip(last).enumerate() {
        let growth = safe_div(*p1, *p0, 0.0);
        if best.map_or(true, |(_, g)| growth > g) {
            best = Some((i, growth));
        }
    }
    best.map(|(i, _)| i)
}

impl Strategy for BestStock {
    fn info(&self) -> &'static StrategyInfo {
        &BEST_STOCK_INFO
    }

    fn params(&self) -> StrategyParams {
        StrategyParams::new()
    }

    fn fit_hindsight(&mut self, full: &History<'_>, _diag: &mut Diagnostics) {
        self.best = best_asset(full.prices());
    }

    fn step(&mut self, history: &History<'_>, _held: &[f64], _diag: &mut Diagnostics) -> Vec<f64> {
        let n = history.n_assets();
        match self.best {
            Some(i) => one_hot(n, i),
            None => uniform(n),
        }
    }
}

// ─── FTL / FTRL ──────────────────────────────────────────────────────

/// Causal leader: solves over the relatives seen so far on every date.
///
/// `penalty` is the FTRL `lambda`; FTL is the unpenalized case.
#[derive(Debug, Clone)]
pub struct FollowTheLeader {
    info: &'static StrategyInfo,
    penalty: f64,
    settings: SolverSettings,
}

impl FollowTheLeader {
    pub fn ftl(settings: SolverSettings) -> Self {
        Self {
            info: &FTL_INFO,
            penalty: 0.0,
            settings,
        }
    }

    pub fn ftrl(lambda: f64, settings: SolverSettings) -> Self {
        Self {
            info: &FTRL_INFO,
            penalty: lambda,
            settings,
        }
    }

    pub fn ftl_from_params(params: &StrategyParams, _n_assets: usize) -> Result<Self, ConfigError> {
        let reader = ParamReader::new(FTL_INFO.id, params);
        reader.allow_only(&["max_iterations", "tolerance"])?;
        Ok(Self::ftl(reader.solver()?))
    }

    pub fn ftrl_from_params(params: &StrategyParams, _n_assets: usize) -> Result<Self, ConfigError> {
        let reader = ParamReader::new(FTRL_INFO.id, params);
        reader.allow_only(&["lambda", "max_iterations", "tolerance"])?;
        let lambda = reader.at_least("lambda", 0.1, 0.0)?;
        Ok(Self::ftrl(lambda, reader.solver()?))
    }
}

impl Strategy for FollowTheLeader {
    fn info(&self) -> &'static StrategyInfo {
        self.info
    }

    fn params(&self) -> StrategyParams {
        let p = StrategyParams::new().with_solver(&self.settings);
        if self.info.id == FTRL_INFO.id {
            p.with("lambda", self.penalty)
        } else {
            p
        }
    }

    fn step(&mut self, history: &History<'_>, _held: &[f64], diag: &mut Diagnostics) -> Vec<f64> {
        let n = history.n_assets();
        if history.t() < 2 {
            return uniform(n);
        }
        solve_constant(history.relatives(), n, self.penalty, &self.settings, diag)
            .unwrap_or_else(|| uniform(n))
    }
}
