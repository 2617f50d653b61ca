//! Weak Aggregating Exponential Gradient.
//!
//! A pool of EG experts with learning rates spread over `[eta_min, eta_max]`,
//! combined by the weak aggregating algorithm: expert `i` gets weight
//! proportional to `exp(G_i / sqrt(t))`, where `G_i` is its cumulative log-wealth.

use crate::diagnostics::Diagnostics;
use crate::domain::History;
use crate::error::ConfigError;
use crate::numeric::safe::{dot, safe_ln};
use crate::numeric::simplex::{finalize, uniform, Projection};

use super::momentum::{eg_update, UpdateRule};
use super::{
    Complexity, ParamReader, Strategy, StrategyFamily, StrategyInfo, StrategyKind, StrategyParams,
};

pub const WAEG_INFO: StrategyInfo = StrategyInfo {
    id: "WAEG",
    name: "Weak Aggregating Exponential Gradient",
    family: StrategyFamily::Momentum,
    kind: StrategyKind::Causal,
    complexity: Complexity::Medium,
    reference: Some("Boosting Exponential Gradient Strategy for Online Portfolio Selection"),
};

#[derive(Debug, Clone)]
pub struct Waeg {
    eta_min: f64,
    eta_max: f64,
    etas: Vec<f64>,
    alpha: f64,
    expert_weights: Vec<Vec<f64>>,
    log_wealth: Vec<f64>,
    mix: Vec<f64>,
    observed_through: usize,
}

impl Waeg {
    pub fn new(n_assets: usize, k: usize, eta_min: f64, eta_max: f64, alpha: f64) -> Self {
        let etas: Vec<f64> = if k == 1 {
            vec![eta_min]
        } else {
            (0..k)
                .map(|i| eta_min + (eta_max - eta_min) * i as f64 / (k - 1) as f64)
                .collect()
        };
        Self {
            expert_weights: vec![uniform(n_assets); k],
            log_wealth: vec![0.0; k],
            mix: uniform(k),
            eta_min,
            eta_max,
            etas,
            alpha,
            observed_through: 0,
        }
    }

    pub fn from_params(params: &StrategyParams, n_assets: usize) -> Result<Self, ConfigError> {
        let reader = ParamReader::new(WAEG_INFO.id, params);
        reader.allow_only(&["k", "eta_min", "eta_max", "alpha"])?;
        let k = reader.integer("k", 20, 1, 10_000)?;
        let eta_min = reader.at_least("eta_min", 0.01, 0.0)?;
        let eta_max = reader.at_least("eta_max", 0.2, eta_min)?;
        let alpha = reader.closed("alpha", 0.0, 0.0, 1.0)?;
        Ok(Self::new(n_assets, k, eta_min, eta_max, alpha))
    }

    /// Current aggregation weights over experts.
    pub fn mix(&self) -> &[f64] {
        &self.mix
    }
}

impl Strategy for Waeg {
    fn info(&self) -> &'static StrategyInfo {
        &WAEG_INFO
    }

    fn params(&self) -> StrategyParams {
        StrategyParams::new()
            .with("k", self.etas.len())
            .with("eta_min", self.eta_min)
            .with("eta_max", self.eta_max)
            .with("alpha", self.alpha)
    }

    fn observe(&mut self, history: &History<'_>) {
        let t = history.t();
        if t == 0 || t <= self.observed_through {
            return;
        }
        self.observed_through = t;
        let x = history.latest_relative();
        let n = x.len() as f64;

        for (lw, b) in self.log_wealth.iter_mut().zip(&self.expert_weights) {
            *lw += safe_ln(dot(b, x));
        }

        let scale = (t as f64).sqrt();
        let peak = self
            .log_wealth
            .iter()
            .map(|g| g / scale)
            .fold(f64::NEG_INFINITY, f64::max);
        let raw: Vec<f64> = self
            .log_wealth
            .iter()
            .map(|g| (g / scale - peak).exp())
            .collect();
        self.mix = finalize(raw, Projection::Normalize);

        for (b, &eta) in self.expert_weights.iter_mut().zip(&self.etas) {
            let mut next = eg_update(b, x, eta, UpdateRule::Multiplicative);
            if self.alpha > 0.0 {
                for w in &mut next {
                    *w = (1.0 - self.alpha) * *w + self.alpha / n;
                }
            }
            *b = next;
        }
    }

    fn step(&mut self, history: &History<'_>, _held: &[f64], _diag: &mut Diagnostics) -> Vec<f64> {
        let mut out = vec![0.0; history.n_assets()];
        for (m, b) in self.mix.iter().zip(&self.expert_weights) {
            for (o, w) in out.iter_mut().zip(b) {
                *o += m * w;
            }
        }
        finalize(out, Projection::Normalize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::ParamValue;
    use crate::strategies::test_support::{assert_all_on_simplex, drive, matrix_from_relatives, zigzag};

    #[test]
    fn learning_rates_span_range() {
        let w = Waeg::new(3, 5, 0.01, 0.21, 0.0);
        assert_eq!(w.etas.len(), 5);
        assert!((w.etas[0] - 0.01).abs() < 1e-12);
        assert!((w.etas[4] - 0.21).abs() < 1e-12);
        assert!((w.etas[2] - 0.11).abs() < 1e-12);
    }

    #[test]
    fn single_expert_keeps_configured_range() {
        let p = StrategyParams::new()
            .with("k", 1_usize)
            .with("eta_min", 0.02)
            .with("eta_max", 0.4);
        let waeg = Waeg::from_params(&p, 3).unwrap();
        assert_eq!(waeg.etas, vec![0.02]);
        let params = waeg.params();
        assert_eq!(params.get("eta_min"), Some(&ParamValue::Number(0.02)));
        assert_eq!(params.get("eta_max"), Some(&ParamValue::Number(0.4)));
    }

    #[test]
    fn weights_stay_on_simplex() {
        let m = matrix_from_relatives(&zigzag(30));
        let mut waeg = Waeg::new(3, 8, 0.01, 0.5, 0.1);
        let (weights, _) = drive(&mut waeg, &m);
        assert_all_on_simplex(&weights);
        assert!(crate::numeric::simplex::is_on_simplex(waeg.mix(), 1e-9));
    }

    #[test]
    fn trending_asset_gains_weight() {
        let mut rel = vec![vec![1.0, 1.0]];
        rel.extend(std::iter::repeat(vec![1.02, 0.99]).take(40));
        let m = matrix_from_relatives(&rel);
        let (weights, _) = drive(&mut Waeg::new(2, 4, 0.05, 0.5, 0.0), &m);
        assert!(weights.last().unwrap()[0] > 0.5);
    }

    #[test]
    fn rejects_inverted_eta_range() {
        let p = StrategyParams::new().with("eta_min", 0.3).with("eta_max", 0.1);
        assert!(Waeg::from_params(&p, 2).is_err());
    }
}
