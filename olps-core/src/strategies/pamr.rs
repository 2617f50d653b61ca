//! Passive Aggressive Mean Reversion.
//!
//! The three variants share [`pamr_update`] and differ only in how the step
//! size `tau` is bounded.

use crate::diagnostics::Diagnostics;
use crate::domain::History;
use crate::error::ConfigError;
use crate::numeric::safe::{demean, dot, l2_norm_sq, DENOM_EPS};
use crate::numeric::simplex::{finalize, uniform, Projection};

use super::{
    Complexity, ParamReader, Strategy, StrategyFamily, StrategyInfo, StrategyKind, StrategyParams,
};

pub const PAMR_INFO: StrategyInfo = StrategyInfo {
    id: "PAMR",
    name: "Passive Aggressive Mean Reversion",
    family: StrategyFamily::MeanReversion,
    kind: StrategyKind::Causal,
    complexity: Complexity::Medium,
    reference: Some("Li et al. 2012"),
};

/// Step-size bound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PamrVariant {
    /// `tau = loss / |x_bar|^2`
    Basic,
    /// `tau = min(C, loss / |x_bar|^2)`
    Capped { aggressiveness: f64 },
    /// `tau = loss / (|x_bar|^2 + 1 / (2C))`
    Smoothed { aggressiveness: f64 },
}

impl PamrVariant {
    pub fn index(self) -> usize {
        match self {
            PamrVariant::Basic => 0,
            PamrVariant::Capped { .. } => 1,
            PamrVariant::Smoothed { .. } => 2,
        }
    }

    pub fn step_size(self, loss: f64, norm_sq: f64) -> f64 {
        if norm_sq < DENOM_EPS {
            return 0.0;
        }
        match self {
            PamrVariant::Basic => loss / norm_sq,
            PamrVariant::Capped { aggressiveness } => (loss / norm_sq).min(aggressiveness),
            PamrVariant::Smoothed { aggressiveness } => {
                if aggressiveness <= 0.0 {
                    return 0.0;
                }
                loss / (norm_sq + 1.0 / (2.0 * aggressiveness))
            }
        }
    }
}

/// One PAMR update of `w` against the realized relative `x`.
pub fn pamr_update(w: &[f64], x: &[f64], epsilon: f64, variant: PamrVariant) -> Vec<f64> {
    let loss = (dot(w, x) - epsilon).max(0.0);
    let x_bar = demean(x);
    let tau = variant.step_size(loss, l2_norm_sq(&x_bar));
    let raw: Vec<f64> = w.iter().zip(&x_bar).map(|(wi, d)| wi - tau * d).collect();
    finalize(raw, Projection::Euclidean)
}

#[derive(Debug, Clone)]
pub struct Pamr {
    epsilon: f64,
    variant: PamrVariant,
    aggressiveness: f64,
    weights: Vec<f64>,
}

impl Pamr {
    pub fn new(n_assets: usize, epsilon: f64, variant: PamrVariant) -> Self {
        let aggressiveness = match variant {
            PamrVariant::Basic => 0.0,
            PamrVariant::Capped { aggressiveness } | PamrVariant::Smoothed { aggressiveness } => {
                aggressiveness
            }
        };
        Self {
            epsilon,
            variant,
            aggressiveness,
            weights: uniform(n_assets),
        }
    }

    pub fn from_params(params: &StrategyParams, n_assets: usize) -> Result<Self, ConfigError> {
        let reader = ParamReader::new(PAMR_INFO.id, params);
        reader.allow_only(&["epsilon", "variant", "aggressiveness"])?;
        let epsilon = reader.at_least("epsilon", 0.5, 0.0)?;
        let aggressiveness = reader.at_least("aggressiveness", 500.0, 0.0)?;
        let variant = match reader.integer("variant", 0, 0, 2)? {
            1 => PamrVariant::Capped { aggressiveness },
            2 => PamrVariant::Smoothed { aggressiveness },
            _ => PamrVariant::Basic,
        };
        let mut pamr = Self::new(n_assets, epsilon, variant);
        pamr.aggressiveness = aggressiveness;
        Ok(pamr)
    }
}

impl Strategy for Pamr {
    fn info(&self) -> &'static StrategyInfo {
        &PAMR_INFO
    }

    fn params(&self) -> StrategyParams {
        StrategyParams::new()
            .with("epsilon", self.epsilon)
            .with("variant", self.variant.index())
            .with("aggressiveness", self.aggressiveness)
    }

    fn step(&mut self, history: &History<'_>, _held: &[f64], _diag: &mut Diagnostics) -> Vec<f64> {
        if history.t() > 0 {
            self.weights = pamr_update(
                &self.weights,
                history.latest_relative(),
                self.epsilon,
                self.variant,
            );
        }
        self.weights.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::test_support::{assert_all_on_simplex, drive, matrix_from_relatives, zigzag};

    #[test]
    fn step_sizes_per_variant() {
        let loss = 0.2;
        let norm_sq = 0.01;
        assert!((PamrVariant::Basic.step_size(loss, norm_sq) - 20.0).abs() < 1e-12);
        let capped = PamrVariant::Capped { aggressiveness: 5.0 };
        assert_eq!(capped.step_size(loss, norm_sq), 5.0);
        let smoothed = PamrVariant::Smoothed { aggressiveness: 50.0 };
        assert!((smoothed.step_size(loss, norm_sq) - 0.2 / 0.02).abs() < 1e-12);
        assert_eq!(PamrVariant::Basic.step_size(loss, 0.0), 0.0);
        assert_eq!(
            PamrVariant::Smoothed { aggressiveness: 0.0 }.step_size(loss, norm_sq),
            0.0
        );
    }

    #[test]
    fn moves_away_from_recent_winner() {
        let w = pamr_update(&[0.5, 0.5], &[1.1, 0.9], 0.5, PamrVariant::Basic);
        assert!(w[1] > w[0]);
    }

    #[test]
    fn passive_when_return_below_epsilon() {
        let w = pamr_update(&[0.3, 0.7], &[1.1, 0.9], 2.0, PamrVariant::Basic);
        assert_eq!(w, vec![0.3, 0.7]);
    }

    #[test]
    fn all_variants_stay_on_simplex() {
        for variant in 0..3usize {
            let p = StrategyParams::new().with("variant", variant);
            let mut pamr = Pamr::from_params(&p, 3).unwrap();
            let (weights, _) = drive(&mut pamr, &matrix_from_relatives(&zigzag(20)));
            assert_all_on_simplex(&weights);
        }
    }

    #[test]
    fn variant_out_of_range_rejected() {
        let p = StrategyParams::new().with("variant", 3usize);
        assert!(Pamr::from_params(&p, 2).is_err());
    }
}
