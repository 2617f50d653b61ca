//! Correlation-driven nonparametric learning: CORN, CORN-K and CORN-U.
//!
//! All three share [`CornExpert::decide`]: find past windows of price
//! relatives whose Pearson correlation with the latest window exceeds `rho`,
//! then solve for the log-optimal portfolio over the relatives that followed
//! them. The variants differ only in how experts are generated and mixed.

use crate::diagnostics::{Diagnostics, WarningKind};
use crate::domain::History;
use crate::error::ConfigError;
use crate::numeric::optimize::maximize_log_wealth;
use crate::numeric::safe::{dot, safe_ln};
use crate::numeric::simplex::{finalize, uniform, Projection};
use crate::numeric::stats::pearson;
use crate::numeric::SolverSettings;

use super::momentum::{mix_experts, top_k_indices};
use super::{
    Complexity, ParamReader, Strategy, StrategyFamily, StrategyInfo, StrategyKind, StrategyParams,
};

pub const CORN_INFO: StrategyInfo = StrategyInfo {
    id: "CORN",
    name: "Correlation-driven Nonparametric Learning",
    family: StrategyFamily::Correlation,
    kind: StrategyKind::Causal,
    complexity: Complexity::High,
    reference: Some("Li, Hoi & Gopalkrishnan 2011"),
};

pub const CORNK_INFO: StrategyInfo = StrategyInfo {
    id: "CORNK",
    name: "CORN Top-K Ensemble",
    family: StrategyFamily::Correlation,
    kind: StrategyKind::Causal,
    complexity: Complexity::VeryHigh,
    reference: Some("Li, Hoi & Gopalkrishnan 2011"),
};

pub const CORNU_INFO: StrategyInfo = StrategyInfo {
    id: "CORNU",
    name: "CORN Uniform Ensemble",
    family: StrategyFamily::Correlation,
    kind: StrategyKind::Causal,
    complexity: Complexity::VeryHigh,
    reference: Some("Li, Hoi & Gopalkrishnan 2011"),
};

// ─── Shared matching routine ─────────────────────────────────────────

/// Indices of the relatives that followed each past window similar to the
/// latest one.
///
/// The latest window is `relatives[t-window+1..=t]`, flattened. Past window
/// `j` is `relatives[j+1..=j+window]`; when its correlation with the latest
/// window exceeds `rho`, index `j+window+1` is returned. Row 0 (the all-ones
/// placeholder) is never part of a window.
pub fn select_similar(relatives: &[Vec<f64>], t: usize, window: usize, rho: f64) -> Vec<usize> {
    if window == 0 || t <= window || t >= relatives.len() {
        return Vec::new();
    }
    let current: Vec<f64> = relatives[t + 1 - window..=t].concat();
    (0..t - window)
        .filter(|&j| {
            let past: Vec<f64> = relatives[j + 1..=j + window].concat();
            pearson(&current, &past) > rho
        })
        .map(|j| j + window + 1)
        .collect()
}

/// What an expert did at one date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    /// Not enough history for a past window; uniform weights.
    Warmup,
    /// No past window cleared `rho`; uniform weights.
    NoSimilarWindows,
    /// Solver hit its iteration cap; uniform weights.
    NotConverged { iterations: usize },
    /// Log-optimal weights over `samples` matched dates.
    Solved { samples: usize },
}

/// One (window, rho) CORN instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CornExpert {
    pub window: usize,
    pub rho: f64,
}

impl CornExpert {
    /// Weights at the decision date `relatives.len() - 1`.
    pub fn decide(&self, relatives: &[Vec<f64>], settings: &SolverSettings) -> (Vec<f64>, Decision) {
        let n = relatives.first().map_or(0, Vec::len);
        let Some(t) = relatives.len().checked_sub(1) else {
            return (uniform(n), Decision::Warmup);
        };
        if t <= self.window {
            return (uniform(n), Decision::Warmup);
        }
        let matched = select_similar(relatives, t, self.window, self.rho);
        if matched.is_empty() {
            return (uniform(n), Decision::NoSimilarWindows);
        }
        let samples: Vec<&[f64]> = matched.iter().map(|&i| relatives[i].as_slice()).collect();
        let outcome = maximize_log_wealth(&samples, n, 0.0, settings);
        if !outcome.converged {
            return (
                uniform(n),
                Decision::NotConverged {
                    iterations: outcome.iterations,
                },
            );
        }
        (
            finalize(outcome.weights, Projection::Euclidean),
            Decision::Solved {
                samples: matched.len(),
            },
        )
    }
}

/// Runs every expert and records at most one warning per kind for the date.
fn decide_all(
    experts: &[CornExpert],
    relatives: &[Vec<f64>],
    settings: &SolverSettings,
    diag: &mut Diagnostics,
) -> Vec<Vec<f64>> {
    let mut unmatched = 0;
    let mut failed = 0;
    let portfolios = experts
        .iter()
        .map(|expert| {
            let (weights, decision) = expert.decide(relatives, settings);
            match decision {
                Decision::NoSimilarWindows => unmatched += 1,
                Decision::NotConverged { .. } => failed += 1,
                Decision::Warmup | Decision::Solved { .. } => {}
            }
            weights
        })
        .collect();
    if unmatched > 0 {
        diag.warn(
            WarningKind::NoSimilarWindows,
            format!("{unmatched} of {} experts found no similar window", experts.len()),
        );
    }
    if failed > 0 {
        diag.warn(
            WarningKind::SolverNotConverged,
            format!("{failed} of {} experts did not converge", experts.len()),
        );
    }
    portfolios
}

// ─── CORN ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Corn {
    expert: CornExpert,
    settings: SolverSettings,
}

impl Corn {
    pub fn new(window: usize, rho: f64, settings: SolverSettings) -> Self {
        Self {
            expert: CornExpert { window, rho },
            settings,
        }
    }

    pub fn from_params(params: &StrategyParams, _n_assets: usize) -> Result<Self, ConfigError> {
        let reader = ParamReader::new(CORN_INFO.id, params);
        reader.allow_only(&["window", "rho", "max_iterations", "tolerance"])?;
        let window = reader.integer("window", 5, 1, usize::MAX)?;
        let rho = reader.closed("rho", 0.1, -1.0, 1.0)?;
        Ok(Self::new(window, rho, reader.solver()?))
    }
}

impl Strategy for Corn {
    fn info(&self) -> &'static StrategyInfo {
        &CORN_INFO
    }

    fn params(&self) -> StrategyParams {
        StrategyParams::new()
            .with("window", self.expert.window)
            .with("rho", self.expert.rho)
            .with_solver(&self.settings)
    }

    fn step(&mut self, history: &History<'_>, _held: &[f64], diag: &mut Diagnostics) -> Vec<f64> {
        let (weights, decision) = self.expert.decide(history.relatives(), &self.settings);
        match decision {
            Decision::NoSimilarWindows => diag.warn(
                WarningKind::NoSimilarWindows,
                format!("no window correlated above {}", self.expert.rho),
            ),
            Decision::NotConverged { iterations } => diag.warn(
                WarningKind::SolverNotConverged,
                format!("solver stopped after {iterations} iterations"),
            ),
            Decision::Warmup | Decision::Solved { .. } => {}
        }
        weights
    }
}

// ─── CORN-K ──────────────────────────────────────────────────────────

/// Mixes the `k` experts with the highest realized wealth, uniformly.
///
/// Equal wealth is broken toward the expert generated first (smaller window,
/// then lower `rho`).
#[derive(Debug, Clone)]
pub struct CornK {
    experts: Vec<CornExpert>,
    k: usize,
    max_window: usize,
    rho_levels: usize,
    settings: SolverSettings,
    last_weights: Vec<Vec<f64>>,
    log_wealth: Vec<f64>,
    observed_through: usize,
}

impl CornK {
    pub fn new(
        n_assets: usize,
        max_window: usize,
        rho_levels: usize,
        k: usize,
        settings: SolverSettings,
    ) -> Self {
        let experts: Vec<CornExpert> = (1..=max_window)
            .flat_map(|window| {
                (0..rho_levels).map(move |r| CornExpert {
                    window,
                    rho: r as f64 / rho_levels as f64,
                })
            })
            .collect();
        Self {
            last_weights: vec![uniform(n_assets); experts.len()],
            log_wealth: vec![0.0; experts.len()],
            experts,
            k,
            max_window,
            rho_levels,
            settings,
            observed_through: 0,
        }
    }

    pub fn from_params(params: &StrategyParams, n_assets: usize) -> Result<Self, ConfigError> {
        let reader = ParamReader::new(CORNK_INFO.id, params);
        reader.allow_only(&["max_window", "rho_levels", "k", "max_iterations", "tolerance"])?;
        let max_window = reader.integer("max_window", 5, 1, 1_000)?;
        let rho_levels = reader.integer("rho_levels", 3, 1, 1_000)?;
        let k = reader.integer("k", 2, 1, max_window * rho_levels)?;
        Ok(Self::new(n_assets, max_window, rho_levels, k, reader.solver()?))
    }

    pub fn experts(&self) -> &[CornExpert] {
        &self.experts
    }

    /// Realized cumulative log-wealth per expert.
    pub fn log_wealth(&self) -> &[f64] {
        &self.log_wealth
    }
}

impl Strategy for CornK {
    fn info(&self) -> &'static StrategyInfo {
        &CORNK_INFO
    }

    fn params(&self) -> StrategyParams {
        StrategyParams::new()
            .with("max_window", self.max_window)
            .with("rho_levels", self.rho_levels)
            .with("k", self.k)
            .with_solver(&self.settings)
    }

    fn observe(&mut self, history: &History<'_>) {
        let t = history.t();
        if t == 0 || t <= self.observed_through {
            return;
        }
        self.observed_through = t;
        let x = history.latest_relative();
        for (lw, w) in self.log_wealth.iter_mut().zip(&self.last_weights) {
            *lw += safe_ln(dot(w, x));
        }
    }

    fn step(&mut self, history: &History<'_>, _held: &[f64], diag: &mut Diagnostics) -> Vec<f64> {
        self.last_weights = decide_all(&self.experts, history.relatives(), &self.settings, diag);
        let top = top_k_indices(&self.log_wealth, self.k);
        let mix: Vec<f64> = (0..self.experts.len())
            .map(|i| if top.contains(&i) { 1.0 } else { 0.0 })
            .collect();
        finalize(mix_experts(&self.last_weights, &mix), Projection::Normalize)
    }
}

// ─── CORN-U ──────────────────────────────────────────────────────────

/// Uniform mix of experts with windows `1..=max_window` and a shared `rho`.
#[derive(Debug, Clone)]
pub struct CornU {
    experts: Vec<CornExpert>,
    max_window: usize,
    rho: f64,
    settings: SolverSettings,
}

impl CornU {
    pub fn new(max_window: usize, rho: f64, settings: SolverSettings) -> Self {
        Self {
            experts: (1..=max_window)
                .map(|window| CornExpert { window, rho })
                .collect(),
            max_window,
            rho,
            settings,
        }
    }

    pub fn from_params(params: &StrategyParams, _n_assets: usize) -> Result<Self, ConfigError> {
        let reader = ParamReader::new(CORNU_INFO.id, params);
        reader.allow_only(&["max_window", "rho", "max_iterations", "tolerance"])?;
        let max_window = reader.integer("max_window", 5, 1, 1_000)?;
        let rho = reader.closed("rho", 0.1, -1.0, 1.0)?;
        Ok(Self::new(max_window, rho, reader.solver()?))
    }
}

impl Strategy for CornU {
    fn info(&self) -> &'static StrategyInfo {
        &CORNU_INFO
    }

    fn params(&self) -> StrategyParams {
        StrategyParams::new()
            .with("max_window", self.max_window)
            .with("rho", self.rho)
            .with_solver(&self.settings)
    }

    fn step(&mut self, history: &History<'_>, _held: &[f64], diag: &mut Diagnostics) -> Vec<f64> {
        let portfolios = decide_all(&self.experts, history.relatives(), &self.settings, diag);
        let mix = vec![1.0; portfolios.len()];
        finalize(mix_experts(&portfolios, &mix), Projection::Normalize)
    }
}
