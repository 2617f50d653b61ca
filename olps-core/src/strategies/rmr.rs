//! Robust Median Reversion.
//!
//! Like OLMAR, but the price forecast is the L1 (geometric) median of the
//! last `window` prices, which is less sensitive to single outliers.

use crate::diagnostics::{Diagnostics, WarningKind};
use crate::domain::History;
use crate::error::ConfigError;
use crate::numeric::median::l1_median;
use crate::numeric::safe::{demean, dot, l1_norm, safe_div, DENOM_EPS};
use crate::numeric::simplex::{finalize, uniform, Projection};

use super::{
    Complexity, ParamReader, Strategy, StrategyFamily, StrategyInfo, StrategyKind, StrategyParams,
};

pub const RMR_INFO: StrategyInfo = StrategyInfo {
    id: "RMR",
    name: "Robust Median Reversion",
    family: StrategyFamily::MeanReversion,
    kind: StrategyKind::CausalLagging,
    complexity: Complexity::High,
    reference: Some("Huang et al. 2016"),
};

#[derive(Debug, Clone)]
pub struct Rmr {
    epsilon: f64,
    window: usize,
    max_iterations: usize,
    tau: f64,
    weights: Vec<f64>,
}

impl Rmr {
    pub fn new(n_assets: usize, epsilon: f64, window: usize, max_iterations: usize, tau: f64) -> Self {
        Self {
            epsilon,
            window,
            max_iterations,
            tau,
            weights: uniform(n_assets),
        }
    }

    pub fn from_params(params: &StrategyParams, n_assets: usize) -> Result<Self, ConfigError> {
        let reader = ParamReader::new(RMR_INFO.id, params);
        reader.allow_only(&["epsilon", "window", "max_iterations", "tau"])?;
        let epsilon = reader.at_least("epsilon", 20.0, 1.0)?;
        let window = reader.integer("window", 7, 2, usize::MAX)?;
        let max_iterations = reader.integer("max_iterations", 200, 2, usize::MAX)?;
        let tau = reader.half_open("tau", 0.001, 0.0, 1.0)?;
        Ok(Self::new(n_assets, epsilon, window, max_iterations, tau))
    }
}

/// One RMR update of `w` toward the predicted relative `x_hat`.
///
/// Step size is `min(0, (w.x_hat - eps) / |x_hat - mean|_1^2)`; a flat
/// prediction leaves `w` unchanged.
pub fn rmr_update(w: &[f64], x_hat: &[f64], epsilon: f64) -> Vec<f64> {
    let deviation = demean(x_hat);
    let l1 = l1_norm(&deviation);
    let l1_sq = l1 * l1;
    if l1_sq < DENOM_EPS {
        return w.to_vec();
    }
    let alpha = ((dot(w, x_hat) - epsilon) / l1_sq).min(0.0);
    let raw: Vec<f64> = w
        .iter()
        .zip(&deviation)
        .map(|(wi, d)| wi - alpha * d)
        .collect();
    finalize(raw, Projection::Euclidean)
}

impl Strategy for Rmr {
    fn info(&self) -> &'static StrategyInfo {
        &RMR_INFO
    }

    fn params(&self) -> StrategyParams {
        StrategyParams::new()
            .with("epsilon", self.epsilon)
            .with("window", self.window)
            .with("max_iterations", self.max_iterations)
            .with("tau", self.tau)
    }

    fn step(&mut self, history: &History<'_>, _held: &[f64], diag: &mut Diagnostics) -> Vec<f64> {
        let t = history.t();
        if t < self.window {
            return self.weights.clone();
        }
        let prices = history.prices();
        let recent = &prices[prices.len() - self.window..];
        let median = l1_median(recent, self.max_iterations, self.tau);
        if !median.converged {
            diag.warn(
                WarningKind::MedianNotConverged,
                format!("L1 median stopped after {} iterations", median.iterations),
            );
        }
        let x_hat: Vec<f64> = median
            .point
            .iter()
            .zip(history.latest_price())
            .map(|(m, p)| safe_div(*m, *p, 1.0))
            .collect();
        self.weights = rmr_update(&self.weights, &x_hat, self.epsilon);
        self.weights.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::test_support::{assert_all_on_simplex, drive, matrix_from_relatives, zigzag};

    #[test]
    fn uniform_until_window_filled() {
        let m = matrix_from_relatives(&zigzag(12));
        let mut rmr = Rmr::new(3, 20.0, 5, 200, 0.001);
        let (weights, diag) = drive(&mut rmr, &m);
        for w in &weights[..5] {
            assert_eq!(w, &uniform(3));
        }
        assert_all_on_simplex(&weights);
        assert_eq!(diag.count(WarningKind::MedianNotConverged), 0);
    }

    #[test]
    fn update_favors_predicted_rebound() {
        let w = rmr_update(&[0.5, 0.5], &[0.9, 1.2], 20.0);
        assert!(w[1] > w[0]);
    }

    #[test]
    fn flat_prediction_keeps_weights() {
        let w = rmr_update(&[0.3, 0.7], &[1.1, 1.1], 20.0);
        assert_eq!(w, vec![0.3, 0.7]);
    }

    #[test]
    fn passive_when_prediction_clears_epsilon() {
        // w.x_hat = 1.05 >= 1 -> alpha = 0
        let w = rmr_update(&[0.5, 0.5], &[1.0, 1.1], 1.0);
        assert_eq!(w, vec![0.5, 0.5]);
    }

    #[test]
    fn parameter_domains_enforced() {
        let bad = [
            ("epsilon", 0.5),
            ("window", 1.0),
            ("max_iterations", 1.0),
            ("tau", 1.0),
        ];
        for (name, value) in bad {
            let p = StrategyParams::new().with(name, value);
            assert!(Rmr::from_params(&p, 3).is_err(), "{name}");
        }
        assert!(Rmr::from_params(&StrategyParams::new(), 3).is_ok());
    }
}
