//! On-Line Moving Average Reversion.
//!
//! Predicts the next price relative as `MA / price` and moves weights toward
//! assets predicted to revert upward, with a passive-aggressive step size
//! `max(0, eps - w.x_hat) / |x_hat - mean(x_hat)|^2`.

use crate::diagnostics::Diagnostics;
use crate::domain::History;
use crate::error::ConfigError;
use crate::numeric::safe::{demean, dot, l2_norm_sq, safe_div};
use crate::numeric::simplex::{finalize, uniform, Projection};

use super::{
    Complexity, ParamReader, Strategy, StrategyFamily, StrategyInfo, StrategyKind, StrategyParams,
};

pub const OLMAR_INFO: StrategyInfo = StrategyInfo {
    id: "OLMAR",
    name: "On-Line Moving Average Reversion",
    family: StrategyFamily::MeanReversion,
    kind: StrategyKind::CausalLagging,
    complexity: Complexity::Medium,
    reference: Some("Li & Hoi 2012"),
};

/// Moving-average estimator of the next price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reversion {
    /// Simple average of the last `window` prices (OLMAR-1).
    Simple { window: usize },
    /// Exponential average with smoothing `alpha` (OLMAR-2).
    Exponential { alpha: f64 },
}

#[derive(Debug, Clone)]
pub struct Olmar {
    epsilon: f64,
    reversion: Reversion,
    weights: Vec<f64>,
    ema: Option<Vec<f64>>,
    ema_through: Option<usize>,
}

impl Olmar {
    pub fn new(n_assets: usize, epsilon: f64, reversion: Reversion) -> Self {
        Self {
            epsilon,
            reversion,
            weights: uniform(n_assets),
            ema: None,
            ema_through: None,
        }
    }

    pub fn from_params(params: &StrategyParams, n_assets: usize) -> Result<Self, ConfigError> {
        let reader = ParamReader::new(OLMAR_INFO.id, params);
        reader.allow_only(&["epsilon", "reversion_method", "window", "alpha"])?;
        let epsilon = reader.at_least("epsilon", 10.0, 1.0)?;
        let window = reader.integer("window", 5, 1, usize::MAX)?;
        let alpha = reader.open("alpha", 0.5, 0.0, 1.0)?;
        let reversion = match reader.choice("reversion_method", "sma", &["sma", "ewa"])? {
            "ewa" => Reversion::Exponential { alpha },
            _ => Reversion::Simple { window },
        };
        Ok(Self::new(n_assets, epsilon, reversion))
    }

    /// Predicted price relative at the decision date, if enough history exists.
    fn predict(&self, history: &History<'_>) -> Option<Vec<f64>> {
        let prices = history.prices();
        let current = history.latest_price();
        let average = match self.reversion {
            Reversion::Simple { window } => {
                if prices.len() < window {
                    return None;
                }
                let recent = &prices[prices.len() - window..];
                (0..current.len())
                    .map(|j| recent.iter().map(|row| row[j]).sum::<f64>() / window as f64)
                    .collect::<Vec<f64>>()
            }
            Reversion::Exponential { .. } => {
                if history.t() == 0 {
                    return None;
                }
                self.ema.clone().unwrap_or_else(|| current.to_vec())
            }
        };
        Some(
            average
                .iter()
                .zip(current)
                .map(|(ma, p)| safe_div(*ma, *p, 1.0))
                .collect(),
        )
    }
}

/// One OLMAR update of `w` toward the predicted relative `x_hat`.
pub fn olmar_update(w: &[f64], x_hat: &[f64], epsilon: f64) -> Vec<f64> {
    let deviation = demean(x_hat);
    let loss = (epsilon - dot(w, x_hat)).max(0.0);
    let lambda = safe_div(loss, l2_norm_sq(&deviation), 0.0);
    let raw: Vec<f64> = w
        .iter()
        .zip(&deviation)
        .map(|(wi, d)| wi + lambda * d)
        .collect();
    finalize(raw, Projection::Euclidean)
}

impl Strategy for Olmar {
    fn info(&self) -> &'static StrategyInfo {
        &OLMAR_INFO
    }

    fn params(&self) -> StrategyParams {
        let p = StrategyParams::new().with("epsilon", self.epsilon);
        match self.reversion {
            Reversion::Simple { window } => p.with("reversion_method", "sma").with("window", window),
            Reversion::Exponential { alpha } => {
                p.with("reversion_method", "ewa").with("alpha", alpha)
            }
        }
    }

    fn observe(&mut self, history: &History<'_>) {
        let Reversion::Exponential { alpha } = self.reversion else {
            return;
        };
        let t = history.t();
        if self.ema_through.is_some_and(|done| t <= done) {
            return;
        }
        let price = history.latest_price();
        self.ema = Some(match self.ema.take() {
            None => price.to_vec(),
            Some(prev) => prev
                .iter()
                .zip(price)
                .map(|(e, p)| alpha * p + (1.0 - alpha) * e)
                .collect(),
        });
        self.ema_through = Some(t);
    }

    fn step(&mut self, history: &History<'_>, _held: &[f64], _diag: &mut Diagnostics) -> Vec<f64> {
        if let Some(x_hat) = self.predict(history) {
            self.weights = olmar_update(&self.weights, &x_hat, self.epsilon);
        }
        self.weights.clone()
    }
}
