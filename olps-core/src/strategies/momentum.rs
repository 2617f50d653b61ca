//! Momentum and expert aggregation: Exponential Gradient, Universal Portfolio.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::diagnostics::Diagnostics;
use crate::domain::History;
use crate::error::ConfigError;
use crate::numeric::safe::{dot, mean, safe_div, safe_ln};
use crate::numeric::simplex::{finalize, normalize_l1, project_euclidean, uniform, Projection};

use super::{
    Complexity, ParamReader, Strategy, StrategyFamily, StrategyInfo, StrategyKind, StrategyParams,
};

pub const EG_INFO: StrategyInfo = StrategyInfo {
    id: "EG",
    name: "Exponential Gradient",
    family: StrategyFamily::Momentum,
    kind: StrategyKind::Causal,
    complexity: Complexity::Medium,
    reference: Some("Helmbold et al. 1998"),
};

pub const UP_INFO: StrategyInfo = StrategyInfo {
    id: "UP",
    name: "Universal Portfolio",
    family: StrategyFamily::Momentum,
    kind: StrategyKind::Causal,
    complexity: Complexity::High,
    reference: Some("Cover 1991"),
};

// ─── Exponential Gradient ────────────────────────────────────────────

/// Weight update rule for [`ExponentialGradient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateRule {
    /// `w_i * exp(eta * x_i / (w.x))`, renormalized.
    Multiplicative,
    /// First-order expansion: `w_i * (1 + eta * (x_i / (w.x) - 1))`.
    ExpGradient,
    /// `w + eta * (x - mean(x)) / (w.x)`, projected onto the simplex.
    GradientProjection,
}

impl UpdateRule {
    pub const CHOICES: [&'static str; 3] = ["MU", "EM", "GP"];

    pub fn label(self) -> &'static str {
        match self {
            UpdateRule::Multiplicative => "MU",
            UpdateRule::ExpGradient => "EM",
            UpdateRule::GradientProjection => "GP",
        }
    }

    fn from_label(label: &str) -> Self {
        match label {
            "EM" => UpdateRule::ExpGradient,
            "GP" => UpdateRule::GradientProjection,
            _ => UpdateRule::Multiplicative,
        }
    }
}

/// One EG update of `w` against the price relative `x`.
pub fn eg_update(w: &[f64], x: &[f64], eta: f64, rule: UpdateRule) -> Vec<f64> {
    let r = dot(w, x);
    match rule {
        UpdateRule::Multiplicative => {
            // log-space to keep large eta * x / r from overflowing exp
            let logs: Vec<f64> = w
                .iter()
                .zip(x)
                .map(|(wi, xi)| {
                    if *wi > 0.0 {
                        wi.ln() + eta * safe_div(*xi, r, 1.0)
                    } else {
                        f64::NEG_INFINITY
                    }
                })
                .collect();
            let peak = logs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            if !peak.is_finite() {
                return uniform(w.len());
            }
            let raw: Vec<f64> = logs.iter().map(|a| (a - peak).exp()).collect();
            normalize_l1(&raw)
        }
        UpdateRule::ExpGradient => {
            let raw: Vec<f64> = w
                .iter()
                .zip(x)
                .map(|(wi, xi)| wi * (1.0 + eta * (safe_div(*xi, r, 1.0) - 1.0)))
                .collect();
            normalize_l1(&raw)
        }
        UpdateRule::GradientProjection => {
            let x_bar = mean(x);
            let raw: Vec<f64> = w
                .iter()
                .zip(x)
                .map(|(wi, xi)| wi + eta * safe_div(xi - x_bar, r, 0.0))
                .collect();
            project_euclidean(&raw)
        }
    }
}

/// Follows recent winners with a learning rate `eta`.
#[derive(Debug, Clone)]
pub struct ExponentialGradient {
    eta: f64,
    rule: UpdateRule,
    weights: Vec<f64>,
}

impl ExponentialGradient {
    pub fn new(n_assets: usize, eta: f64, rule: UpdateRule) -> Self {
        Self {
            eta,
            rule,
            weights: uniform(n_assets),
        }
    }

    pub fn from_params(params: &StrategyParams, n_assets: usize) -> Result<Self, ConfigError> {
        let reader = ParamReader::new(EG_INFO.id, params);
        reader.allow_only(&["eta", "update_rule"])?;
        let eta = reader.number("eta", 0.05)?;
        if eta <= 0.0 {
            return Err(ConfigError::OutOfRange {
                strategy: EG_INFO.id.to_string(),
                param: "eta".to_string(),
                value: eta,
                domain: "(0, inf)".to_string(),
            });
        }
        let rule = UpdateRule::from_label(reader.choice("update_rule", "MU", &UpdateRule::CHOICES)?);
        Ok(Self::new(n_assets, eta, rule))
    }
}

impl Strategy for ExponentialGradient {
    fn info(&self) -> &'static StrategyInfo {
        &EG_INFO
    }

    fn params(&self) -> StrategyParams {
        StrategyParams::new()
            .with("eta", self.eta)
            .with("update_rule", self.rule.label())
    }

    fn step(&mut self, history: &History<'_>, _held: &[f64], _diag: &mut Diagnostics) -> Vec<f64> {
        if history.t() > 0 {
            self.weights = eg_update(&self.weights, history.latest_relative(), self.eta, self.rule);
        }
        self.weights = finalize(std::mem::take(&mut self.weights), Projection::Normalize);
        self.weights.clone()
    }
}

// ─── Universal Portfolio ─────────────────────────────────────────────

/// How expert portfolios are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    /// Weighted by each expert's cumulative wealth.
    HistoricalPerformance,
    /// Plain average of all experts.
    Uniform,
    /// Plain average of the `k` wealthiest experts.
    TopK(usize),
}

impl Aggregation {
    fn label(self) -> &'static str {
        match self {
            Aggregation::HistoricalPerformance => "hist_performance",
            Aggregation::Uniform => "uniform",
            Aggregation::TopK(_) => "top_k",
        }
    }
}

/// Indices of the `k` largest scores, ties broken toward the lower index.
pub fn top_k_indices(scores: &[f64], k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    // stable sort keeps index order among equal scores
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    order.truncate(k.min(scores.len()));
    order
}

/// Average rows of `experts` with non-negative `mix` weights.
pub(crate) fn mix_experts(experts: &[Vec<f64>], mix: &[f64]) -> Vec<f64> {
    let n = experts.first().map_or(0, Vec::len);
    let total: f64 = mix.iter().sum();
    let mut out = vec![0.0; n];
    if total <= 0.0 || !total.is_finite() {
        return uniform(n);
    }
    for (expert, &m) in experts.iter().zip(mix) {
        for (o, e) in out.iter_mut().zip(expert) {
            *o += m / total * e;
        }
    }
    out
}

/// Cover's universal portfolio over a finite pool of constant-rebalanced experts.
#[derive(Debug, Clone)]
pub struct UniversalPortfolio {
    experts: Vec<Vec<f64>>,
    log_wealth: Vec<f64>,
    aggregation: Aggregation,
    seed: u64,
    custom_experts: bool,
    observed_through: usize,
}

impl UniversalPortfolio {
    /// Pool of `n_experts` Dirichlet(1) draws from a seeded generator.
    pub fn random(n_assets: usize, n_experts: usize, seed: u64, aggregation: Aggregation) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let experts = (0..n_experts)
            .map(|_| {
                let raw: Vec<f64> = (0..n_assets)
                    .map(|_| -(1.0 - rng.gen::<f64>()).ln())
                    .collect();
                normalize_l1(&raw)
            })
            .collect();
        let mut up = Self::with_experts(experts, aggregation);
        up.seed = seed;
        up.custom_experts = false;
        up
    }

    pub fn with_experts(experts: Vec<Vec<f64>>, aggregation: Aggregation) -> Self {
        let experts: Vec<Vec<f64>> = experts
            .into_iter()
            .map(|e| finalize(e, Projection::Normalize))
            .collect();
        Self {
            log_wealth: vec![0.0; experts.len()],
            experts,
            aggregation,
            seed: 0,
            custom_experts: true,
            observed_through: 0,
        }
    }

    pub fn from_params(params: &StrategyParams, n_assets: usize) -> Result<Self, ConfigError> {
        let reader = ParamReader::new(UP_INFO.id, params);
        reader.allow_only(&["n_experts", "aggregation", "k", "seed", "expert_weights"])?;
        let n_experts = reader.integer("n_experts", 100, 1, 1_000_000)?;
        let seed = reader.integer("seed", 42, 0, usize::MAX)? as u64;
        let k = reader.integer("k", 10, 1, usize::MAX)?;
        let aggregation = match reader.choice(
            "aggregation",
            "hist_performance",
            &["hist_performance", "uniform", "top_k"],
        )? {
            "uniform" => Aggregation::Uniform,
            "top_k" => Aggregation::TopK(k),
            _ => Aggregation::HistoricalPerformance,
        };
        let custom = reader.weight_rows("expert_weights", n_assets)?;
        let pool = custom.as_ref().map_or(n_experts, Vec::len);
        if let Aggregation::TopK(k) = aggregation {
            if k > pool {
                return Err(ConfigError::OutOfRange {
                    strategy: UP_INFO.id.to_string(),
                    param: "k".to_string(),
                    value: k as f64,
                    domain: format!("[1, {pool}] (number of experts)"),
                });
            }
        }
        Ok(match custom {
            Some(experts) => Self::with_experts(experts, aggregation),
            None => Self::random(n_assets, n_experts, seed, aggregation),
        })
    }

    pub fn experts(&self) -> &[Vec<f64>] {
        &self.experts
    }

    /// Cumulative log-wealth per expert.
    pub fn log_wealth(&self) -> &[f64] {
        &self.log_wealth
    }
}

impl Strategy for UniversalPortfolio {
    fn info(&self) -> &'static StrategyInfo {
        &UP_INFO
    }

    fn params(&self) -> StrategyParams {
        let mut p = StrategyParams::new().with("aggregation", self.aggregation.label());
        if let Aggregation::TopK(k) = self.aggregation {
            p.insert("k", k);
        }
        if self.custom_experts {
            p.insert("expert_weights", self.experts.clone());
        } else {
            p.insert("n_experts", self.experts.len());
            p.insert("seed", self.seed as f64);
        }
        p
    }

    fn observe(&mut self, history: &History<'_>) {
        let t = history.t();
        if t == 0 || t <= self.observed_through {
            return;
        }
        self.observed_through = t;
        let x = history.latest_relative();
        for (lw, expert) in self.log_wealth.iter_mut().zip(&self.experts) {
            *lw += safe_ln(dot(expert, x));
        }
    }

    fn step(&mut self, history: &History<'_>, _held: &[f64], _diag: &mut Diagnostics) -> Vec<f64> {
        if self.experts.is_empty() {
            return uniform(history.n_assets());
        }
        let raw = match self.aggregation {
            Aggregation::HistoricalPerformance => {
                let peak = self
                    .log_wealth
                    .iter()
                    .copied()
                    .fold(f64::NEG_INFINITY, f64::max);
                let mix: Vec<f64> = self.log_wealth.iter().map(|lw| (lw - peak).exp()).collect();
                mix_experts(&self.experts, &mix)
            }
            Aggregation::Uniform => mix_experts(&self.experts, &vec![1.0; self.experts.len()]),
            Aggregation::TopK(k) => {
                let mut mix = vec![0.0; self.experts.len()];
                for idx in top_k_indices(&self.log_wealth, k) {
                    mix[idx] = 1.0;
                }
                mix_experts(&self.experts, &mix)
            }
        };
        finalize(raw, Projection::Normalize)
    }
}
